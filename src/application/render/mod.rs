//! Obtaining document HTML.
//!
//! Documents are authored as macro-bearing source; a remote expansion service
//! turns that source into presentable HTML. The pipeline here decides whether
//! rendered output is wanted at all, whether the stored rendering can be
//! served or a fresh expansion must be requested, and falls back to the raw
//! stored source when the service cannot deliver. The fallback is a normal
//! outcome, never an error, and is never retried within a request.

mod client;
mod types;

pub use client::{DisabledMacroService, HttpMacroService, MacroService, MacroServiceError};
pub use types::{MacroError, MacroRender, RenderOutcome};

use std::sync::Arc;

use metrics::counter;
use tracing::warn;

use crate::application::documents::Caller;
use crate::domain::entities::DocumentRecord;

const SOURCE: &str = "application::render::RenderPipeline";

pub struct RenderPipeline {
    macros: Arc<dyn MacroService>,
}

impl RenderPipeline {
    pub fn new(macros: Arc<dyn MacroService>) -> Self {
        Self { macros }
    }

    /// Whether macro-expanded output should be served for this request.
    ///
    /// Expansion must be enabled, the document must not be a redirect stub,
    /// and the caller must not be asking for raw source.
    pub fn should_use_rendered(&self, document: &DocumentRecord, raw_requested: bool) -> bool {
        self.macros.is_enabled() && !document.is_redirect && !raw_requested
    }

    /// Obtain HTML for a document.
    ///
    /// Only an authenticated caller sending `Cache-Control: no-cache` forces
    /// a fresh remote expansion; everyone else accepts the stored rendering
    /// when one exists.
    pub async fn obtain_html(
        &self,
        document: &DocumentRecord,
        caller: &Caller,
        base_url: &str,
        use_rendered: bool,
    ) -> RenderOutcome {
        if !use_rendered {
            return RenderOutcome {
                html: document.html.clone(),
                errors: None,
                raw_fallback: false,
            };
        }

        let cache_control = (caller.is_authenticated() && caller.requests_no_cache)
            .then_some("no-cache");

        if cache_control.is_none() && !document.rendered_html.is_empty() {
            return RenderOutcome {
                html: document.rendered_html.clone(),
                errors: stored_errors(document),
                raw_fallback: false,
            };
        }

        match self.macros.render(document, cache_control, base_url).await {
            Ok(render) => {
                let html = if render.html.is_empty() {
                    // The service answered but produced nothing; keep
                    // whatever rendering the record already carries.
                    if document.rendered_html.is_empty() {
                        document.html.clone()
                    } else {
                        document.rendered_html.clone()
                    }
                } else {
                    sanitize_rendered(&render.html)
                };
                let errors = (!render.errors.is_empty()).then_some(render.errors);
                RenderOutcome {
                    html,
                    errors,
                    raw_fallback: false,
                }
            }
            Err(err) => {
                counter!("foglio_macro_unavailable_total").increment(1);
                warn!(
                    target = SOURCE,
                    locale = %document.locale,
                    slug = %document.slug,
                    error = %err,
                    "macro service unavailable"
                );

                if !document.rendered_html.is_empty() {
                    // A stale rendering beats raw source when we have one.
                    return RenderOutcome {
                        html: document.rendered_html.clone(),
                        errors: stored_errors(document),
                        raw_fallback: false,
                    };
                }

                counter!("foglio_render_raw_fallback_total").increment(1);
                RenderOutcome {
                    html: document.html.clone(),
                    errors: None,
                    raw_fallback: true,
                }
            }
        }
    }
}

fn stored_errors(document: &DocumentRecord) -> Option<Vec<MacroError>> {
    let raw = document.rendered_errors.as_deref()?;
    match serde_json::from_str::<Vec<MacroError>>(raw) {
        Ok(errors) if errors.is_empty() => None,
        Ok(errors) => Some(errors),
        Err(err) => {
            warn!(
                target = SOURCE,
                slug = %document.slug,
                error = %err,
                "stored render diagnostics are unreadable"
            );
            None
        }
    }
}

/// Sanitize HTML returned by the remote service before it is served or
/// filtered further. Section anchors and class hooks survive sanitization.
fn sanitize_rendered(html: &str) -> String {
    ammonia::Builder::default()
        .add_tags(["section", "figure", "figcaption"])
        .add_generic_attributes(["id", "class"])
        .clean(html)
        .to_string()
}
