//! Depth-bounded descendant trees for the children endpoint.

use futures::future::BoxFuture;
use serde_json::json;

use crate::application::error::AppError;
use crate::domain::entities::DocumentBundle;

use super::{DocumentService, assemble, map_repo};

/// Hard ceiling on tree depth, regardless of what the caller requests.
pub const MAX_TREE_DEPTH: usize = 5;

/// Build the JSON node for a document and, while `level < depth`, its
/// descendants sorted by title. Redirect documents contribute no node and
/// are omitted from `subpages`.
pub(crate) fn build_tree<'a>(
    service: &'a DocumentService,
    bundle: &'a DocumentBundle,
    level: usize,
    expand: bool,
    depth: usize,
) -> BoxFuture<'a, Result<Option<serde_json::Value>, AppError>> {
    Box::pin(async move {
        if bundle.document.is_redirect {
            return Ok(None);
        }

        let mut node = if expand {
            let payload = assemble::document_api_data(service.repo(), service.site(), bundle, None)
                .await?;
            let mut value = serde_json::to_value(payload.document_data)
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            value["subpages"] = json!([]);
            value
        } else {
            json!({
                "title": bundle.document.title,
                "slug": bundle.document.slug,
                "locale": bundle.document.locale,
                "url": service.site().doc_path(&bundle.document.locale, &bundle.document.slug),
                "subpages": [],
            })
        };

        if level < depth {
            let mut children = service
                .repo()
                .list_children(bundle.document.id)
                .await
                .map_err(map_repo)?;
            children.sort_by(|a, b| a.document.title.cmp(&b.document.title));

            let subpages = node["subpages"]
                .as_array_mut()
                .expect("subpages initialized above");
            for child in &children {
                if let Some(subtree) =
                    build_tree(service, child, level + 1, expand, depth).await?
                {
                    subpages.push(subtree);
                }
            }
        }

        Ok(Some(node))
    })
}
