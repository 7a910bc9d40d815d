//! Content-experiment catalog.
//!
//! Experiments swap an alternate document body in for a subset of requests
//! based on a query-parameter-selected variant. The catalog is read from a
//! TOML file once at startup, is immutable for the life of the process, and
//! is injected into the selector rather than read from ambient state.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExperimentCatalogError {
    #[error("failed to read experiment catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse experiment catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("experiment `{id}` declares no pages")]
    EmptyExperiment { id: String },
}

/// A single A/B content experiment.
///
/// `pages` maps `"{locale}:{slug}"` keys to the variant table for that page:
/// variant name to the slug of the document carrying that variant's body.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ContentExperiment {
    pub id: String,
    pub ga_name: String,
    pub param: String,
    pub pages: HashMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    experiments: Vec<ContentExperiment>,
}

/// Process-wide, read-only set of active experiments.
#[derive(Debug, Default)]
pub struct ExperimentCatalog {
    experiments: Vec<ContentExperiment>,
}

impl ExperimentCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(experiments: Vec<ContentExperiment>) -> Self {
        Self { experiments }
    }

    pub fn load(path: &Path) -> Result<Self, ExperimentCatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ExperimentCatalogError> {
        let file: CatalogFile = toml::from_str(raw)?;
        for experiment in &file.experiments {
            if experiment.pages.is_empty() {
                return Err(ExperimentCatalogError::EmptyExperiment {
                    id: experiment.id.clone(),
                });
            }
        }
        Ok(Self::new(file.experiments))
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Find the experiment covering `(locale, slug)`, if any, together with
    /// the variant table for that page.
    pub fn find(
        &self,
        locale: &str,
        slug: &str,
    ) -> Option<(&ContentExperiment, &BTreeMap<String, String>)> {
        let key = page_key(locale, slug);
        self.experiments
            .iter()
            .find_map(|experiment| experiment.pages.get(&key).map(|variants| (experiment, variants)))
    }
}

pub fn page_key(locale: &str, slug: &str) -> String {
    format!("{locale}:{slug}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[experiments]]
        id = "experiment-interactive-editor"
        ga_name = "interactive-editor"
        param = "v"

        [experiments.pages."en-US:Web/CSS/color"]
        "#;

    const FULL_CATALOG: &str = r#"
        [[experiments]]
        id = "experiment-compat-tables"
        ga_name = "compat-tables"
        param = "v"

        [experiments.pages."en-US:Web/CSS/display"]
        a = "Experiment:CompatTables/Web/CSS/display"
        b = "Experiment:CompatTablesB/Web/CSS/display"
        "#;

    #[test]
    fn catalog_parses_and_finds_pages() {
        let catalog = ExperimentCatalog::from_toml_str(FULL_CATALOG).expect("catalog");
        let (experiment, variants) = catalog.find("en-US", "Web/CSS/display").expect("experiment");
        assert_eq!(experiment.param, "v");
        assert_eq!(
            variants.get("a").map(String::as_str),
            Some("Experiment:CompatTables/Web/CSS/display")
        );
    }

    #[test]
    fn catalog_misses_other_locales() {
        let catalog = ExperimentCatalog::from_toml_str(FULL_CATALOG).expect("catalog");
        assert!(catalog.find("fr", "Web/CSS/display").is_none());
        assert!(catalog.find("en-US", "Web/CSS/color").is_none());
    }

    #[test]
    fn empty_variant_tables_parse() {
        // A page key with no declared variants still parses; selection simply
        // never validates.
        let catalog = ExperimentCatalog::from_toml_str(CATALOG).expect("catalog");
        assert!(!catalog.is_empty());
        let (_, variants) = catalog.find("en-US", "Web/CSS/color").expect("experiment");
        assert!(variants.is_empty());
    }
}
