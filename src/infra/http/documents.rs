//! Document endpoints.
//!
//! Slugs are hierarchical and may contain `/`, so a single wildcard route
//! carries every document action; the trailing path segment selects the
//! action (`…/children`, `…/json`, `…/toc`, `…/subscribe`,
//! `…/subscribe-to-tree`, `…/move`). A bare `json`/`toc` tail addresses the
//! lookup-by-query form.

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::{
        documents::{
            Caller, DocumentLookup, DocumentViewOutcome, RequestParams, ResponseMode,
        },
        error::HttpError,
        moves::MoveRequestOutcome,
    },
    domain::slug::split_slug,
    presentation::views::{
        DeletionLogTemplate, DocumentTemplate, MoveFormTemplate, MoveFormView,
        MoveRequestedTemplate, MoveRequestedView, render_not_found_response,
        render_template_response,
    },
};

use super::{
    HttpState, add_never_cache_headers, caller_from_headers, patch_vary_cookie,
    set_revision_header,
};

const SOURCE: &str = "infra::http::documents";

#[derive(Debug, PartialEq, Eq)]
enum GetAction<'a> {
    View(&'a str),
    Children(&'a str),
    Json(&'a str),
    Toc(&'a str),
    MoveForm(&'a str),
}

#[derive(Debug, PartialEq, Eq)]
enum PostAction<'a> {
    Subscribe(&'a str),
    SubscribeTree(&'a str),
    Move(&'a str),
}

fn get_action(rest: &str) -> GetAction<'_> {
    let rest = rest.trim_end_matches('/');
    if let Some(slug) = strip_action(rest, "children") {
        GetAction::Children(slug)
    } else if let Some(slug) = strip_action(rest, "json") {
        GetAction::Json(slug)
    } else if let Some(slug) = strip_action(rest, "toc") {
        GetAction::Toc(slug)
    } else if let Some(slug) = strip_action(rest, "move") {
        GetAction::MoveForm(slug)
    } else {
        GetAction::View(rest)
    }
}

fn post_action(rest: &str) -> Option<PostAction<'_>> {
    let rest = rest.trim_end_matches('/');
    if let Some(slug) = strip_action(rest, "subscribe-to-tree") {
        Some(PostAction::SubscribeTree(slug))
    } else if let Some(slug) = strip_action(rest, "subscribe") {
        Some(PostAction::Subscribe(slug))
    } else {
        strip_action(rest, "move").map(PostAction::Move)
    }
}

/// `Web/CSS/children` → `Web/CSS`; a bare `children` leaves an empty slug.
fn strip_action<'a>(rest: &'a str, action: &str) -> Option<&'a str> {
    if rest == action {
        return Some("");
    }
    rest.strip_suffix(action)
        .and_then(|prefix| prefix.strip_suffix('/'))
}

pub(super) async fn document_get(
    State(state): State<HttpState>,
    Path((locale, rest)): Path<(String, String)>,
    uri: Uri,
    headers: axum::http::HeaderMap,
) -> Response {
    let caller = caller_from_headers(&headers);
    let params = RequestParams::from_query(uri.query());

    match get_action(&rest) {
        GetAction::View(slug) => {
            document_view(&state, &locale, slug, &params, &caller, &headers).await
        }
        GetAction::Children(slug) => children(&state, &locale, slug, &params).await,
        GetAction::Json(slug) => document_json(&state, &locale, slug, &params, &caller).await,
        GetAction::Toc(slug) => toc(&state, &locale, slug, &params).await,
        GetAction::MoveForm(slug) => move_form(&state, &locale, slug, &caller).await,
    }
}

pub(super) async fn document_post(
    State(state): State<HttpState>,
    Path((locale, rest)): Path<(String, String)>,
    headers: axum::http::HeaderMap,
    body: String,
) -> Response {
    let caller = caller_from_headers(&headers);

    match post_action(&rest) {
        Some(PostAction::Subscribe(slug)) => {
            subscribe(&state, &locale, slug, &caller, &headers, false).await
        }
        Some(PostAction::SubscribeTree(slug)) => {
            subscribe(&state, &locale, slug, &caller, &headers, true).await
        }
        Some(PostAction::Move(slug)) => move_submit(&state, &locale, slug, &caller, &body).await,
        None => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn document_view(
    state: &HttpState,
    locale: &str,
    slug: &str,
    params: &RequestParams,
    caller: &Caller,
    headers: &axum::http::HeaderMap,
) -> Response {
    let mode = if wants_json(headers) {
        ResponseMode::Api
    } else {
        ResponseMode::Page
    };

    let outcome = match state
        .documents
        .document_view(locale, slug, params, caller, mode)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    match outcome {
        DocumentViewOutcome::Page(context) => {
            let revision_id = context.analytics_page_revision;
            let has_diagnostics =
                context.macro_errors.is_some() || context.render_raw_fallback;
            let mut response =
                render_template_response(DocumentTemplate { view: *context }, StatusCode::OK);
            if has_diagnostics || caller.is_authenticated() {
                add_never_cache_headers(&mut response);
            }
            patch_vary_cookie(&mut response);
            set_revision_header(&mut response, revision_id);
            response
        }
        DocumentViewOutcome::Api {
            payload,
            revision_id,
        } => {
            let mut response = Json(*payload).into_response();
            patch_vary_cookie(&mut response);
            set_revision_header(&mut response, revision_id);
            response
        }
        DocumentViewOutcome::Raw { html, revision_id } => {
            let mut response = Response::new(Body::from(html));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            response
                .headers_mut()
                .insert("X-Frame-Options", HeaderValue::from_static("Allow"));
            response
                .headers_mut()
                .insert("X-Robots-Tag", HeaderValue::from_static("noindex"));
            if caller.is_authenticated() {
                add_never_cache_headers(&mut response);
            }
            patch_vary_cookie(&mut response);
            set_revision_header(&mut response, revision_id);
            response
        }
        DocumentViewOutcome::Redirect {
            url,
            permanent,
            never_cache,
        } => {
            let mut response = if permanent {
                Redirect::permanent(&url).into_response()
            } else {
                Redirect::to(&url).into_response()
            };
            if never_cache {
                add_never_cache_headers(&mut response);
            }
            response
        }
        DocumentViewOutcome::Deleted(entry) => {
            let mut response = render_template_response(
                DeletionLogTemplate { entry: *entry },
                StatusCode::NOT_FOUND,
            );
            add_never_cache_headers(&mut response);
            response
                .headers_mut()
                .insert("X-Robots-Tag", HeaderValue::from_static("noindex"));
            response
        }
        DocumentViewOutcome::NotFound => render_not_found_response(),
    }
}

async fn children(
    state: &HttpState,
    locale: &str,
    slug: &str,
    params: &RequestParams,
) -> Response {
    let expand = params.has("expand");
    let depth = params
        .get("depth")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(crate::application::documents::MAX_TREE_DEPTH);

    match state.documents.children(locale, slug, expand, depth).await {
        Ok(tree) => Json(tree).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn document_json(
    state: &HttpState,
    locale: &str,
    slug: &str,
    params: &RequestParams,
    caller: &Caller,
) -> Response {
    let lookup = match lookup_from(locale, slug, params) {
        Ok(lookup) => lookup,
        Err(err) => return err.into_response(),
    };

    let stale = !(caller.is_authenticated() && caller.requests_no_cache);

    match state.documents.document_json(&lookup, caller, stale).await {
        Ok(Some(payload)) => Json(payload).into_response(),
        Ok(None) => render_not_found_response(),
        Err(err) => err.into_response(),
    }
}

async fn toc(state: &HttpState, locale: &str, slug: &str, params: &RequestParams) -> Response {
    let lookup = match lookup_from(locale, slug, params) {
        Ok(lookup) => lookup,
        Err(err) => return err.into_response(),
    };

    match state.documents.toc_fragment(&lookup).await {
        Ok(Some(fragment)) => {
            let mut response = Response::new(Body::from(fragment));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            response
                .headers_mut()
                .insert("X-Robots-Tag", HeaderValue::from_static("noindex"));
            response
        }
        Ok(None) => render_not_found_response(),
        Err(err) => err.into_response(),
    }
}

/// Path-addressed lookups use the slug; the bare query form requires
/// `title=` or `slug=` and is a 400 without either.
fn lookup_from(
    locale: &str,
    slug: &str,
    params: &RequestParams,
) -> Result<DocumentLookup, HttpError> {
    if !slug.is_empty() {
        return Ok(DocumentLookup::BySlug {
            locale: locale.to_string(),
            slug: slug.to_string(),
        });
    }

    if let Some(title) = params.get("title") {
        return Ok(DocumentLookup::ByTitle {
            locale: locale.to_string(),
            title: title.to_string(),
        });
    }

    if let Some(slug) = params.get("slug") {
        return Ok(DocumentLookup::BySlug {
            locale: locale.to_string(),
            slug: slug.to_string(),
        });
    }

    Err(HttpError::new(
        SOURCE,
        StatusCode::BAD_REQUEST,
        "Missing document identifier",
        "Lookup requires a path slug, or a `title` or `slug` query parameter",
    ))
}

async fn subscribe(
    state: &HttpState,
    locale: &str,
    slug: &str,
    caller: &Caller,
    headers: &axum::http::HeaderMap,
    in_tree: bool,
) -> Response {
    let Some(username) = caller.username.as_deref() else {
        return HttpError::new(
            SOURCE,
            StatusCode::UNAUTHORIZED,
            "Login required",
            "Subscription toggles require an authenticated caller",
        )
        .into_response();
    };

    let bundle = match state.documents.find_bundle(locale, slug).await {
        Ok(Some(bundle)) => bundle,
        Ok(None) => return render_not_found_response(),
        Err(err) => return err.into_response(),
    };

    let toggled = if in_tree {
        state.subscriptions.toggle_tree(username, &bundle).await
    } else {
        state.subscriptions.toggle_document(username, &bundle).await
    };

    match toggled {
        Ok(status) => {
            if is_programmatic(headers) {
                Json(serde_json::json!({ "status": status })).into_response()
            } else {
                Redirect::to(&state.documents.site().doc_path(locale, slug)).into_response()
            }
        }
        Err(err) => err.into_response(),
    }
}

fn is_programmatic(headers: &axum::http::HeaderMap) -> bool {
    let requested_with = headers
        .get("X-Requested-With")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("XMLHttpRequest"));
    requested_with || wants_json(headers)
}

fn wants_json(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"))
}

async fn move_form(state: &HttpState, locale: &str, slug: &str, caller: &Caller) -> Response {
    match require_move_target(state, locale, slug, caller).await {
        Ok((bundle, descendants_count)) => {
            let parts = split_slug(slug);
            let mut response = render_template_response(
                MoveFormTemplate {
                    view: MoveFormView {
                        title: bundle.document.title.clone(),
                        locale: locale.to_string(),
                        slug: slug.to_string(),
                        specific_slug: parts.specific,
                        descendants_count,
                        conflicts: Vec::new(),
                        error: None,
                    },
                },
                StatusCode::OK,
            );
            add_never_cache_headers(&mut response);
            response
                .headers_mut()
                .insert("X-Robots-Tag", HeaderValue::from_static("noindex"));
            response
        }
        Err(response) => response,
    }
}

async fn move_submit(
    state: &HttpState,
    locale: &str,
    slug: &str,
    caller: &Caller,
    body: &str,
) -> Response {
    let (bundle, descendants_count) =
        match require_move_target(state, locale, slug, caller).await {
            Ok(ok) => ok,
            Err(response) => return response,
        };

    let new_slug = url::form_urlencoded::parse(body.as_bytes())
        .find(|(key, _)| key == "slug")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    let requested_by = caller.username.as_deref().unwrap_or_default();
    let parts = split_slug(slug);

    let form_view = |conflicts: Vec<String>, error: Option<String>| MoveFormView {
        title: bundle.document.title.clone(),
        locale: locale.to_string(),
        slug: slug.to_string(),
        specific_slug: parts.specific.clone(),
        descendants_count,
        conflicts,
        error,
    };

    match state.moves.request_move(&bundle, &new_slug, requested_by).await {
        Ok(MoveRequestOutcome::Enqueued { .. }) => {
            let mut response = render_template_response(
                MoveRequestedTemplate {
                    view: MoveRequestedView {
                        title: bundle.document.title.clone(),
                        locale: locale.to_string(),
                        slug: slug.to_string(),
                        new_slug,
                    },
                },
                StatusCode::OK,
            );
            add_never_cache_headers(&mut response);
            response
        }
        Ok(MoveRequestOutcome::Conflicts(conflicts)) => {
            let mut response = render_template_response(
                MoveFormTemplate {
                    view: form_view(conflicts, None),
                },
                StatusCode::OK,
            );
            add_never_cache_headers(&mut response);
            response
        }
        Ok(MoveRequestOutcome::InvalidSlug(err)) => {
            let mut response = render_template_response(
                MoveFormTemplate {
                    view: form_view(Vec::new(), Some(err.to_string())),
                },
                StatusCode::BAD_REQUEST,
            );
            add_never_cache_headers(&mut response);
            response
        }
        Err(err) => err.into_response(),
    }
}

async fn require_move_target(
    state: &HttpState,
    locale: &str,
    slug: &str,
    caller: &Caller,
) -> Result<(crate::domain::entities::DocumentBundle, usize), Response> {
    if !caller.can_move() {
        return Err(HttpError::new(
            SOURCE,
            StatusCode::FORBIDDEN,
            "Permission denied",
            "Tree moves require the move permission",
        )
        .into_response());
    }

    let bundle = match state.documents.find_bundle(locale, slug).await {
        Ok(Some(bundle)) => bundle,
        Ok(None) => return Err(render_not_found_response()),
        Err(err) => return Err(err.into_response()),
    };

    let descendants_count = match state.moves.descendant_count(&bundle).await {
        Ok(count) => count,
        Err(err) => return Err(err.into_response()),
    };

    Ok((bundle, descendants_count))
}
