//! Content-experiment variant selection.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::application::documents::RequestParams;
use crate::application::error::AppError;
use crate::application::repos::DocumentsRepo;
use crate::domain::entities::DocumentBundle;
use crate::domain::experiments::ExperimentCatalog;

use super::map_repo;

/// Metadata describing the experiment state of a page, surfaced to templates
/// and analytics regardless of whether a variant was selected.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExperimentInfo {
    pub id: String,
    pub ga_name: String,
    pub param: String,
    pub original_path: String,
    pub variants: BTreeMap<String, String>,
    pub selected: Option<String>,
    pub selection_is_valid: Option<bool>,
}

/// Swap in the experiment variant the request selected, when valid.
///
/// Returns the variant bundle with `selected`/`selection_is_valid` set when
/// the declared variant's document exists in the same locale; the original
/// bundle with `selection_is_valid = false` for an undeclared name or a
/// missing backing document; the original bundle with `selected = None` when
/// no variant parameter was sent; `(original, None)` when the page is not
/// under any experiment.
pub(crate) async fn apply_content_experiment(
    repo: &dyn DocumentsRepo,
    catalog: &ExperimentCatalog,
    bundle: DocumentBundle,
    params: &RequestParams,
    original_path: &str,
) -> Result<(DocumentBundle, Option<ExperimentInfo>), AppError> {
    let locale = bundle.document.locale.clone();
    let Some((experiment, variants)) = catalog.find(&locale, &bundle.document.slug) else {
        return Ok((bundle, None));
    };

    let mut info = ExperimentInfo {
        id: experiment.id.clone(),
        ga_name: experiment.ga_name.clone(),
        param: experiment.param.clone(),
        original_path: original_path.to_string(),
        variants: variants.clone(),
        selected: None,
        selection_is_valid: None,
    };

    let Some(selected) = params.get(&experiment.param) else {
        return Ok((bundle, Some(info)));
    };

    info.selection_is_valid = Some(false);
    for (variant, variant_slug) in variants {
        if selected == variant {
            if let Some(variant_bundle) =
                repo.find_bundle(&locale, variant_slug).await.map_err(map_repo)?
            {
                info.selected = Some(selected.to_string());
                info.selection_is_valid = Some(true);
                return Ok((variant_bundle, Some(info)));
            }
        }
    }

    Ok((bundle, Some(info)))
}
