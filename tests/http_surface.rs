//! Router-level tests over the in-memory repositories.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{MemoryRepoBuilder, http_state, record};
use tower::ServiceExt;

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn document_page_sets_revision_and_vary_headers() {
    let mut builder = MemoryRepoBuilder::new();
    let bundle = builder.approved(record("en-US", "Web/CSS"));
    builder.contributors(bundle.document.id, &["sheppy", "wbamberg"]);
    let router = foglio::infra::http::build_router(http_state(builder.build()));

    let response = router.oneshot(get("/docs/en-US/Web/CSS")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let revision = response
        .headers()
        .get("X-kuma-revision")
        .expect("revision header")
        .to_str()
        .expect("header value")
        .to_string();
    assert_eq!(
        revision,
        bundle.document.current_revision_id.expect("revision").to_string()
    );
    assert_eq!(response.headers().get(header::VARY).expect("vary"), "Cookie");

    let body = body_string(response).await;
    assert!(body.contains("source of Web/CSS"));
    assert!(body.contains("sheppy"));
}

#[tokio::test]
async fn accept_json_selects_the_api_renderer() {
    let mut builder = MemoryRepoBuilder::new();
    builder.approved(record("en-US", "Web/CSS"));
    let router = foglio::infra::http::build_router(http_state(builder.build()));

    let request = Request::builder()
        .uri("/docs/en-US/Web/CSS")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .expect("request");
    let response = router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let payload: serde_json::Value =
        serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(payload["documentData"]["slug"], "Web/CSS");
    assert_eq!(payload["documentData"]["enSlug"], "Web/CSS");
    assert!(payload["redirectURL"].is_null());
}

#[tokio::test]
async fn raw_view_carries_frame_and_robots_headers() {
    let mut builder = MemoryRepoBuilder::new();
    builder.approved(record("en-US", "Web/CSS"));
    let router = foglio::infra::http::build_router(http_state(builder.build()));

    let response = router
        .oneshot(get("/docs/en-US/Web/CSS?raw"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Frame-Options").expect("frame header"),
        "Allow"
    );
    assert_eq!(
        response.headers().get("X-Robots-Tag").expect("robots header"),
        "noindex"
    );
}

#[tokio::test]
async fn missing_document_is_a_full_404_page() {
    let router = foglio::infra::http::build_router(http_state(MemoryRepoBuilder::new().build()));

    let response = router
        .oneshot(get("/docs/fr/Missing/Page"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.contains("Page not found"));
}

#[tokio::test]
async fn children_endpoint_returns_tree_or_error_body() {
    let mut builder = MemoryRepoBuilder::new();
    let root = builder.approved(record("en-US", "Tree"));
    let child = builder.approved(record("en-US", "Tree/leaf"));
    builder.link_parent_topic(child.document.id, &root);
    let router = foglio::infra::http::build_router(http_state(builder.build()));

    let response = router
        .oneshot(get("/docs/en-US/Tree/children?depth=2"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let tree: serde_json::Value = serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(tree["subpages"][0]["slug"], "Tree/leaf");

    let router = foglio::infra::http::build_router(http_state(MemoryRepoBuilder::new().build()));
    let response = router
        .oneshot(get("/docs/en-US/Nothing/children"))
        .await
        .expect("response");
    // Missing documents answer with an error body, not an error status.
    assert_eq!(response.status(), StatusCode::OK);
    let tree: serde_json::Value = serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(tree["error"], "Document does not exist.");
}

#[tokio::test]
async fn query_form_lookups_require_an_identifier() {
    let mut builder = MemoryRepoBuilder::new();
    let mut doc = record("en-US", "Web/CSS");
    doc.toc_html = "<li><a href=\"#syntax\">Syntax</a></li>".to_string();
    builder.approved(doc);
    let router = foglio::infra::http::build_router(http_state(builder.build()));

    let response = router
        .clone()
        .oneshot(get("/docs/en-US/json"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .clone()
        .oneshot(get("/docs/en-US/json?slug=Web/CSS"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload: serde_json::Value =
        serde_json::from_str(&body_string(response).await).expect("json");
    assert_eq!(payload["documentData"]["title"], "CSS");

    let response = router
        .oneshot(get("/docs/en-US/toc?slug=Web/CSS"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.starts_with("<ol>"));
    assert!(body.contains("#syntax"));
}

#[tokio::test]
async fn subscribe_requires_login_and_toggles() {
    let mut builder = MemoryRepoBuilder::new();
    builder.approved(record("en-US", "Web/CSS"));
    let router = foglio::infra::http::build_router(http_state(builder.build()));

    let anonymous = Request::builder()
        .method("POST")
        .uri("/docs/en-US/Web/CSS/subscribe")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(anonymous).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let subscribe = |router: axum::Router| async move {
        let request = Request::builder()
            .method("POST")
            .uri("/docs/en-US/Web/CSS/subscribe")
            .header("x-foglio-user", "reader")
            .header("X-Requested-With", "XMLHttpRequest")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let payload: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("json");
        payload["status"].as_u64().expect("status")
    };

    assert_eq!(subscribe(router.clone()).await, 1);
    assert_eq!(subscribe(router).await, 0);
}

#[tokio::test]
async fn move_workflow_enforces_permission_and_reports_conflicts() {
    let mut builder = MemoryRepoBuilder::new();
    let root = builder.approved(record("en-US", "Web/CSS"));
    let child = builder.approved(record("en-US", "Web/CSS/color"));
    builder.link_parent_topic(child.document.id, &root);
    builder.approved(record("en-US", "Web/Style/color"));
    let router = foglio::infra::http::build_router(http_state(builder.build()));

    let response = router
        .clone()
        .oneshot(get("/docs/en-US/Web/CSS/move"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let form = Request::builder()
        .uri("/docs/en-US/Web/CSS/move")
        .header("x-foglio-user", "editor")
        .header("x-foglio-permissions", "move")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(form).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("1 subpages"));

    let submit = Request::builder()
        .method("POST")
        .uri("/docs/en-US/Web/CSS/move")
        .header("x-foglio-user", "editor")
        .header("x-foglio-permissions", "move")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("slug=Web%2FStyle"))
        .expect("request");
    let response = router.clone().oneshot(submit).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Web/Style/color"));

    let submit = Request::builder()
        .method("POST")
        .uri("/docs/en-US/Web/CSS/move")
        .header("x-foglio-user", "editor")
        .header("x-foglio-permissions", "move")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("slug=Web%2FStyling"))
        .expect("request");
    let response = router.oneshot(submit).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Move in progress"));
}

#[tokio::test]
async fn health_endpoint_answers_ok() {
    let router = foglio::infra::http::build_router(http_state(MemoryRepoBuilder::new().build()));

    let response = router.oneshot(get("/_health/db")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}
