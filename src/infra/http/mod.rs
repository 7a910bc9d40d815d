//! Axum transport layer.

mod documents;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::{
    documents::{Caller, DocumentService},
    moves::TreeMoveService,
    repos::HealthRepo,
    subscriptions::SubscriptionService,
};

use middleware::{log_responses, set_request_context};

/// Revision id of the served document, for cache validation by editors and
/// crawlers of the API.
pub const REVISION_HEADER: &str = "X-kuma-revision";

/// Trusted headers injected by the fronting proxy. The pipeline never
/// evaluates credentials itself.
const USER_HEADER: &str = "x-foglio-user";
const PERMISSIONS_HEADER: &str = "x-foglio-permissions";

#[derive(Clone)]
pub struct HttpState {
    pub documents: Arc<DocumentService>,
    pub moves: Arc<TreeMoveService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(
            "/docs/{locale}/{*rest}",
            get(documents::document_get).post(documents::document_post),
        )
        .route("/_health/db", get(db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn db_health(
    axum::extract::State(state): axum::extract::State<HttpState>,
) -> Response {
    match state.health.ping().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(err) => crate::application::error::HttpError::new(
            "infra::http::db_health",
            StatusCode::SERVICE_UNAVAILABLE,
            "Database unavailable",
            err.to_string(),
        )
        .into_response(),
    }
}

/// Build the caller identity from the trusted proxy headers plus the
/// caller's own cache-control signal.
pub fn caller_from_headers(headers: &HeaderMap) -> Caller {
    let username = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let permissions = headers
        .get(PERMISSIONS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|permission| !permission.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let requests_no_cache = headers
        .get(header::CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("no-cache"));

    Caller {
        username,
        permissions,
        requests_no_cache,
    }
}

/// Responses that are diagnostic or user-specific must not be cached by any
/// intermediary.
pub fn add_never_cache_headers(response: &mut Response) {
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("max-age=0, no-cache, no-store, must-revalidate, private"),
    );
}

/// Cookies affect document responses (authenticated affordances), so caches
/// must consider them.
pub fn patch_vary_cookie(response: &mut Response) {
    let headers = response.headers_mut();
    let merged = match headers.get(header::VARY).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => {
            if existing
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("cookie"))
            {
                return;
            }
            format!("{existing}, Cookie")
        }
        _ => "Cookie".to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&merged) {
        headers.insert(header::VARY, value);
    }
}

pub fn set_revision_header(response: &mut Response, revision_id: Option<uuid::Uuid>) {
    if let Some(revision_id) = revision_id {
        if let Ok(value) = HeaderValue::from_str(&revision_id.to_string()) {
            response.headers_mut().insert(REVISION_HEADER, value);
        }
    }
}
