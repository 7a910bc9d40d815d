//! Request-driven HTML post-processing.
//!
//! A resolved document's HTML is reshaped according to query parameters in a
//! fixed order: summary short-circuit, anchor-id injection and editor-safety
//! neutralization for raw views, section extraction, edit-link injection,
//! and `noinclude` stripping. The order is load-bearing: safety filtering
//! runs before extraction so extracted sections are already neutralized, and
//! edit links are injected after extraction so they reference the narrowed
//! section. `noinclude` stripping always runs last on serialized output.

mod sections;

pub use sections::FilterError;

use crate::domain::entities::DocumentRecord;

/// Rendering parameters read from the request query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams {
    pub raw: bool,
    pub summary: bool,
    pub include: bool,
    pub edit_links: bool,
    pub section: Option<String>,
}

impl FilterParams {
    fn is_noop(&self) -> bool {
        !self.raw && !self.edit_links && !self.include && self.section.is_none()
    }
}

/// Apply the filtering/annotating operations a request asked for.
pub fn filter_document_html(
    document: &DocumentRecord,
    html: &str,
    params: &FilterParams,
    authenticated: bool,
) -> Result<String, FilterError> {
    // ?summary serves the stored summary hunk and nothing else.
    if params.summary {
        return Ok(document.summary_html.clone());
    }

    // Fast path: nothing to do, skip the parse cost entirely.
    if params.is_noop() {
        return Ok(html.to_string());
    }

    let mut filtered = html.to_string();

    // Raw views feed editors; make sure sections are addressable and inline
    // handlers cannot reach them.
    if params.raw {
        filtered = sections::inject_section_ids(&filtered)?;
        filtered = sections::filter_editor_safety(&filtered)?;
    }

    if let Some(section_id) = params.section.as_deref() {
        filtered = sections::extract_section(&filtered, section_id);
    }

    if (params.edit_links || !params.raw) && authenticated {
        filtered =
            sections::inject_section_edit_links(&filtered, &document.locale, &document.slug)?;
    }

    if params.include {
        filtered = sections::filter_out_noinclude(&filtered)?;
    }

    Ok(filtered)
}
