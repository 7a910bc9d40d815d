//! The document resolution and rendering pipeline.
//!
//! A `(locale, slug)` request flows through: slug parsing → lookup with
//! fallback reasons → miss handling (deletion log, default-locale fallback,
//! deleted-parent redirect, create redirect) → redirect decision →
//! content-experiment variant selection → HTML acquisition → request-driven
//! filtering → response assembly. Each step is its own module; this one
//! orchestrates.

mod assemble;
mod experiments;
mod redirects;
mod resolver;
mod tree;

pub use assemble::{
    DocumentApiData, DocumentData, DocumentPageContext, HrefLangLink, TranslationData,
};
pub use experiments::ExperimentInfo;
pub use tree::MAX_TREE_DEPTH;

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::filter::{self, FilterParams};
use crate::application::render::RenderPipeline;
use crate::application::repos::{DeletionLogRepo, DocumentsRepo};
use crate::domain::entities::{DeletionLogRecord, DocumentBundle};
use crate::domain::experiments::ExperimentCatalog;
use crate::domain::slug::split_slug;

/// Identity booleans handed to the pipeline by the fronting proxy. The
/// pipeline never evaluates permissions itself.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub username: Option<String>,
    pub permissions: HashSet<String>,
    /// The caller sent `Cache-Control: no-cache` (an editor's hard reload).
    pub requests_no_cache: bool,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permissions.insert(permission.to_string());
        self
    }

    pub fn with_no_cache(mut self) -> Self {
        self.requests_no_cache = true;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    pub fn can_restore(&self) -> bool {
        self.permissions.contains("restore")
    }

    pub fn can_move(&self) -> bool {
        self.permissions.contains("move")
    }
}

/// Ordered multimap of query parameters. Experiment parameters have dynamic
/// names, so the raw pairs are kept rather than a fixed struct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn from_query(query: Option<&str>) -> Self {
        let pairs = query
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    pub fn has(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// Serialize the pairs back into a query string (no leading `?`).
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.pairs {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }

    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            raw: self.has("raw"),
            summary: self.has("summary"),
            include: self.has("include"),
            edit_links: self.has("edit_links"),
            section: self.get("section").map(str::to_string),
        }
    }
}

/// Site-wide addressing context injected at startup.
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub default_locale: String,
    pub public_url: String,
}

impl SiteContext {
    pub fn doc_path(&self, locale: &str, slug: &str) -> String {
        format!("/docs/{locale}/{slug}")
    }

    pub fn base_url(&self) -> String {
        let trimmed = self.public_url.trim_end_matches('/');
        format!("{trimmed}/")
    }

    pub fn absolutify(&self, path: &str) -> String {
        let root = self.base_url();
        format!("{root}{}", path.trim_start_matches('/'))
    }
}

/// Which renderer assembles the final response. Both arms consume the same
/// resolved triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Page,
    Api,
}

/// Terminal outcome of the document pipeline, mapped onto an HTTP response
/// by the transport layer.
#[derive(Debug)]
pub enum DocumentViewOutcome {
    Page(Box<DocumentPageContext>),
    Api {
        payload: Box<DocumentApiData>,
        revision_id: Option<Uuid>,
    },
    Raw {
        html: String,
        revision_id: Option<Uuid>,
    },
    Redirect {
        url: String,
        permanent: bool,
        never_cache: bool,
    },
    Deleted(Box<DeletionLogRecord>),
    NotFound,
}

/// How a JSON/TOC lookup addresses its document.
#[derive(Debug, Clone)]
pub enum DocumentLookup {
    BySlug { locale: String, slug: String },
    ByTitle { locale: String, title: String },
}

pub struct DocumentService {
    documents: Arc<dyn DocumentsRepo>,
    deletion_log: Arc<dyn DeletionLogRepo>,
    experiments: Arc<ExperimentCatalog>,
    render: Arc<RenderPipeline>,
    site: SiteContext,
}

impl DocumentService {
    pub fn new(
        documents: Arc<dyn DocumentsRepo>,
        deletion_log: Arc<dyn DeletionLogRepo>,
        experiments: Arc<ExperimentCatalog>,
        render: Arc<RenderPipeline>,
        site: SiteContext,
    ) -> Self {
        Self {
            documents,
            deletion_log,
            experiments,
            render,
            site,
        }
    }

    pub fn site(&self) -> &SiteContext {
        &self.site
    }

    pub(crate) fn repo(&self) -> &dyn DocumentsRepo {
        self.documents.as_ref()
    }

    /// Run the full pipeline for a document view request.
    pub async fn document_view(
        &self,
        locale: &str,
        slug: &str,
        params: &RequestParams,
        caller: &Caller,
        mode: ResponseMode,
    ) -> Result<DocumentViewOutcome, AppError> {
        let parts = split_slug(slug);
        let resolver = resolver::DocumentResolver::new(
            self.documents.as_ref(),
            self.deletion_log.as_ref(),
            &self.site,
        );

        let (bundle, mut fallback_reason) = resolver.resolve(locale, slug).await?;

        let bundle = match bundle {
            Some(bundle) => bundle,
            None => {
                match resolver.resolve_miss(locale, slug, &parts, params, caller).await? {
                    resolver::MissOutcome::Fallback { bundle, reason } => {
                        fallback_reason = reason;
                        bundle
                    }
                    resolver::MissOutcome::Redirect { url, never_cache } => {
                        return Ok(DocumentViewOutcome::Redirect {
                            url,
                            permanent: false,
                            never_cache,
                        });
                    }
                    resolver::MissOutcome::Deleted(entry) => {
                        return Ok(DocumentViewOutcome::Deleted(Box::new(entry)));
                    }
                    resolver::MissOutcome::NotFound => return Ok(DocumentViewOutcome::NotFound),
                }
            }
        };

        // One redirect decision per request; never chased further.
        if let Some(decision) = redirects::redirect_decision(&bundle, params, &self.site) {
            return Ok(DocumentViewOutcome::Redirect {
                url: decision.url,
                permanent: true,
                never_cache: false,
            });
        }

        let original = bundle;
        let (serving, experiment) = match mode {
            ResponseMode::Page => {
                let original_path = self
                    .site
                    .doc_path(&original.document.locale, &original.document.slug);
                experiments::apply_content_experiment(
                    self.documents.as_ref(),
                    &self.experiments,
                    original.clone(),
                    params,
                    &original_path,
                )
                .await?
            }
            ResponseMode::Api => (original.clone(), None),
        };

        let filter_params = params.filter_params();
        let use_rendered = self
            .render
            .should_use_rendered(&serving.document, filter_params.raw);
        let rendered = self
            .render
            .obtain_html(&serving.document, caller, &self.site.base_url(), use_rendered)
            .await;

        let filtered = filter::filter_document_html(
            &serving.document,
            &rendered.html,
            &filter_params,
            caller.is_authenticated(),
        )
        .map_err(|err| AppError::unexpected(err.to_string()))?;

        if filter_params.raw {
            return Ok(DocumentViewOutcome::Raw {
                html: filtered,
                revision_id: serving.document.current_revision_id,
            });
        }

        match mode {
            ResponseMode::Api => {
                let payload = assemble::document_api_data(
                    self.documents.as_ref(),
                    &self.site,
                    &serving,
                    Some(&filtered),
                )
                .await?;
                Ok(DocumentViewOutcome::Api {
                    payload: Box::new(payload),
                    revision_id: serving.document.current_revision_id,
                })
            }
            ResponseMode::Page => {
                let toc_html = self.toc_for(&serving, &filter_params);
                let context = assemble::build_page_context(
                    self.documents.as_ref(),
                    &self.site,
                    assemble::PageContextInputs {
                        original: &original,
                        serving: &serving,
                        document_html: filtered,
                        toc_html,
                        fallback_reason,
                        macro_errors: rendered.errors,
                        raw_fallback: rendered.raw_fallback,
                        experiment,
                        redirected_from: params.get("redirected_from").map(str::to_string),
                        parts: &parts,
                    },
                )
                .await?;
                Ok(DocumentViewOutcome::Page(Box::new(context)))
            }
        }
    }

    fn toc_for(&self, bundle: &DocumentBundle, params: &FilterParams) -> Option<String> {
        if params.raw {
            return None;
        }
        let depth = bundle
            .current_revision
            .as_ref()
            .map(|revision| revision.toc_depth)
            .unwrap_or(0);
        if depth > 0 && !bundle.document.toc_html.is_empty() {
            Some(bundle.document.toc_html.clone())
        } else {
            None
        }
    }

    /// JSON children tree, depth clamped to [`MAX_TREE_DEPTH`].
    pub async fn children(
        &self,
        locale: &str,
        slug: &str,
        expand: bool,
        depth: usize,
    ) -> Result<serde_json::Value, AppError> {
        let depth = depth.min(MAX_TREE_DEPTH);
        let Some(bundle) = self.documents.find_bundle(locale, slug).await.map_err(map_repo)?
        else {
            return Ok(serde_json::json!({ "error": "Document does not exist." }));
        };

        match tree::build_tree(self, &bundle, 0, expand, depth).await? {
            Some(node) => Ok(node),
            None => Ok(serde_json::json!({ "error": "Document has moved." })),
        }
    }

    /// Document summary payload for the JSON endpoint. `stale == false`
    /// refreshes the body through the render pipeline before assembling.
    pub async fn document_json(
        &self,
        lookup: &DocumentLookup,
        caller: &Caller,
        stale: bool,
    ) -> Result<Option<DocumentApiData>, AppError> {
        let Some(bundle) = self.lookup_approved(lookup).await? else {
            return Ok(None);
        };

        // Redirect documents answer with the redirect envelope instead of a
        // payload assembled from the stub's own (empty) content.
        if bundle.document.is_redirect {
            if let Some(target) = &bundle.parent {
                return Ok(Some(DocumentApiData::redirect(
                    self.site.doc_path(&target.locale, &target.slug),
                )));
            }
        }

        let body_override = if stale {
            None
        } else {
            let rendered = self
                .render
                .obtain_html(&bundle.document, caller, &self.site.base_url(), true)
                .await;
            Some(rendered.html)
        };

        let payload = assemble::document_api_data(
            self.documents.as_ref(),
            &self.site,
            &bundle,
            body_override.as_deref(),
        )
        .await?;
        Ok(Some(payload))
    }

    /// Table-of-contents fragment, wrapped in `<ol>` when non-empty.
    pub async fn toc_fragment(&self, lookup: &DocumentLookup) -> Result<Option<String>, AppError> {
        let Some(bundle) = self.lookup_approved(lookup).await? else {
            return Ok(None);
        };

        let toc = &bundle.document.toc_html;
        if toc.is_empty() {
            Ok(Some(String::new()))
        } else {
            Ok(Some(format!("<ol>{toc}</ol>")))
        }
    }

    pub async fn find_bundle(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Option<DocumentBundle>, AppError> {
        self.documents.find_bundle(locale, slug).await.map_err(map_repo)
    }

    /// Lookups used by the title/slug-addressed endpoints require an
    /// approved current revision.
    async fn lookup_approved(
        &self,
        lookup: &DocumentLookup,
    ) -> Result<Option<DocumentBundle>, AppError> {
        let bundle = match lookup {
            DocumentLookup::BySlug { locale, slug } => {
                self.documents.find_bundle(locale, slug).await.map_err(map_repo)?
            }
            DocumentLookup::ByTitle { locale, title } => self
                .documents
                .find_bundle_by_title(locale, title)
                .await
                .map_err(map_repo)?,
        };

        Ok(bundle.filter(|bundle| bundle.document.current_revision_id.is_some()))
    }
}

pub(crate) fn map_repo(err: crate::application::repos::RepoError) -> AppError {
    AppError::unexpected(err.to_string())
}
