//! The single-hop redirect decision.

use crate::application::documents::{RequestParams, SiteContext};
use crate::domain::entities::DocumentBundle;

pub(crate) struct RedirectDecision {
    pub(crate) url: String,
}

/// Decide whether a resolved document should redirect the request.
///
/// `redirect=no` suppresses following so editors can reach the redirect stub
/// itself. A target equal to the document's own canonical path would loop
/// and is never followed. Exactly one hop: the target's own redirects are
/// not chased. All original query parameters are propagated, plus a
/// `redirected_from` marker the target page surfaces as a one-time notice.
pub(crate) fn redirect_decision(
    bundle: &DocumentBundle,
    params: &RequestParams,
    site: &SiteContext,
) -> Option<RedirectDecision> {
    if params.get("redirect") == Some("no") {
        return None;
    }

    if !bundle.document.is_redirect {
        return None;
    }

    let target = bundle.parent.as_ref()?;
    let target_path = site.doc_path(&target.locale, &target.slug);
    let own_path = site.doc_path(&bundle.document.locale, &bundle.document.slug);

    if target_path == own_path {
        return None;
    }

    let forwarded = params
        .clone()
        .with_param("redirected_from", site.absolutify(&own_path));
    let url = format!("{target_path}?{}", forwarded.to_query_string());

    Some(RedirectDecision { url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{DocumentRecord, DocumentStub};
    use uuid::Uuid;

    fn site() -> SiteContext {
        SiteContext {
            default_locale: "en-US".to_string(),
            public_url: "https://wiki.example.org".to_string(),
        }
    }

    fn stub(locale: &str, slug: &str) -> DocumentStub {
        DocumentStub {
            id: Uuid::new_v4(),
            locale: locale.to_string(),
            slug: slug.to_string(),
            title: slug.to_string(),
            is_redirect: false,
            parent_id: None,
            parent_topic_id: None,
            current_revision_id: Some(Uuid::new_v4()),
        }
    }

    fn redirect_bundle(slug: &str, target: Option<DocumentStub>) -> DocumentBundle {
        DocumentBundle {
            document: DocumentRecord {
                id: Uuid::new_v4(),
                locale: "en-US".to_string(),
                slug: slug.to_string(),
                title: slug.to_string(),
                html: String::new(),
                rendered_html: String::new(),
                rendered_errors: None,
                body_html: String::new(),
                toc_html: String::new(),
                summary_html: String::new(),
                summary_text: String::new(),
                quick_links_html: String::new(),
                is_redirect: true,
                is_localizable: true,
                parent_id: target.as_ref().map(|t| t.id),
                parent_topic_id: None,
                current_revision_id: Some(Uuid::new_v4()),
                deleted_at: None,
            },
            current_revision: None,
            parent: target,
            parent_topic: None,
        }
    }

    #[test]
    fn redirect_follows_target_and_propagates_params() {
        let bundle = redirect_bundle("Old/Page", Some(stub("en-US", "New/Page")));
        let params = RequestParams::from_query(Some("section=intro"));

        let decision = redirect_decision(&bundle, &params, &site()).expect("redirect");
        assert!(decision.url.starts_with("/docs/en-US/New/Page?"));
        assert!(decision.url.contains("section=intro"));
        assert!(decision.url.contains("redirected_from="));
    }

    #[test]
    fn redirect_no_reaches_the_stub() {
        let bundle = redirect_bundle("Old/Page", Some(stub("en-US", "New/Page")));
        let params = RequestParams::from_query(Some("redirect=no"));
        assert!(redirect_decision(&bundle, &params, &site()).is_none());
    }

    #[test]
    fn self_redirect_never_loops() {
        let bundle = redirect_bundle("Same/Page", Some(stub("en-US", "Same/Page")));
        let params = RequestParams::default();
        assert!(redirect_decision(&bundle, &params, &site()).is_none());
    }

    #[test]
    fn redirect_with_no_target_is_served_in_place() {
        let bundle = redirect_bundle("Orphan", None);
        assert!(redirect_decision(&bundle, &RequestParams::default(), &site()).is_none());
    }
}
