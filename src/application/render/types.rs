use serde::{Deserialize, Serialize};

/// A non-fatal diagnostic produced while expanding macros in a document.
/// Surfaced to editors alongside the page, never treated as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroError {
    pub name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
}

/// Successful response from the macro-expansion service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MacroRender {
    pub html: String,
    #[serde(default)]
    pub errors: Vec<MacroError>,
}

/// What the pipeline hands to the content filter: the HTML to serve, any
/// expansion diagnostics, and whether raw stored source had to stand in for
/// rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub html: String,
    pub errors: Option<Vec<MacroError>>,
    pub raw_fallback: bool,
}
