//! Locating the document a request addresses.
//!
//! The exact `(locale, slug)` lookup and the miss-handling steps are kept
//! distinct because their outcomes differ: deletion produces a terminal 404
//! (restore-capable for privileged callers), the default-locale fallback can
//! either redirect to a translation or serve foreign content with a reason,
//! and the create redirect only exists for authenticated callers. Deleted
//! state always takes precedence over the create path.

use crate::application::documents::{Caller, RequestParams, SiteContext};
use crate::application::error::AppError;
use crate::application::repos::{DeletionLogRepo, DocumentsRepo};
use crate::domain::entities::{DeletionLogRecord, DocumentBundle};
use crate::domain::slug::SlugParts;
use crate::domain::types::FallbackReason;

use super::map_repo;

/// Query parameters whose presence forbids the create redirect: they address
/// existing content and must 404 when none exists.
const CONTENT_ADDRESSING_PARAMS: &[&str] = &["raw", "include", "nocreate"];

pub(crate) enum MissOutcome {
    /// Serve a document from the default locale, annotated with why.
    Fallback {
        bundle: DocumentBundle,
        reason: Option<FallbackReason>,
    },
    Redirect {
        url: String,
        never_cache: bool,
    },
    Deleted(DeletionLogRecord),
    NotFound,
}

pub(crate) struct DocumentResolver<'a> {
    documents: &'a dyn DocumentsRepo,
    deletion_log: &'a dyn DeletionLogRepo,
    site: &'a SiteContext,
}

impl<'a> DocumentResolver<'a> {
    pub(crate) fn new(
        documents: &'a dyn DocumentsRepo,
        deletion_log: &'a dyn DeletionLogRepo,
        site: &'a SiteContext,
    ) -> Self {
        Self {
            documents,
            deletion_log,
            site,
        }
    }

    /// Exact lookup. A found document without an approved revision yields a
    /// fallback reason rather than a miss.
    pub(crate) async fn resolve(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<(Option<DocumentBundle>, Option<FallbackReason>), AppError> {
        let Some(bundle) = self.documents.find_bundle(locale, slug).await.map_err(map_repo)?
        else {
            return Ok((None, None));
        };

        let reason = if bundle.document.current_revision_id.is_none() {
            let parent_approved = bundle
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_approved());
            if parent_approved {
                Some(FallbackReason::TranslationNotApproved)
            } else {
                Some(FallbackReason::NoContent)
            }
        } else {
            None
        };

        Ok((Some(bundle), reason))
    }

    /// Miss handling, in precedence order: deletion log, default-locale
    /// fallback, deleted-parent redirect, create redirect.
    pub(crate) async fn resolve_miss(
        &self,
        locale: &str,
        slug: &str,
        parts: &SlugParts,
        params: &RequestParams,
        caller: &Caller,
    ) -> Result<MissOutcome, AppError> {
        // The document may once have existed. Deleted state wins over every
        // other miss outcome, but is only disclosed to privileged callers.
        let entries = self
            .deletion_log
            .list_entries(locale, slug)
            .await
            .map_err(map_repo)?;
        if let Some(newest) = entries.into_iter().next() {
            let deleted_exists = self
                .documents
                .deleted_document_exists(locale, slug)
                .await
                .map_err(map_repo)?;
            if deleted_exists {
                if caller.can_restore() {
                    return Ok(MissOutcome::Deleted(newest));
                }
                return Ok(MissOutcome::NotFound);
            }
        }

        if let Some(outcome) = self.default_locale_fallback(locale, slug, params).await? {
            return Ok(outcome);
        }

        // A translated page may have been deleted while its source-locale
        // parent still exists; send the caller there.
        if locale != self.site.default_locale {
            if let Some(url) = self.deleted_parent_redirect(locale, slug).await? {
                return Ok(MissOutcome::Redirect {
                    url,
                    never_cache: false,
                });
            }
        }

        self.create_redirect(locale, slug, parts, params, caller).await
    }

    /// Look for the document in the default locale and decide between
    /// redirecting to a translation and serving the default-locale content
    /// with a reason.
    async fn default_locale_fallback(
        &self,
        locale: &str,
        slug: &str,
        params: &RequestParams,
    ) -> Result<Option<MissOutcome>, AppError> {
        let Some(fallback) = self
            .documents
            .find_bundle(&self.site.default_locale, slug)
            .await
            .map_err(map_repo)?
        else {
            return Ok(None);
        };

        let translation = self
            .documents
            .find_translation(fallback.document.id, locale)
            .await
            .map_err(map_repo)?;

        let fallback_approved = fallback.document.current_revision_id.is_some();

        match translation {
            Some(translation) if translation.is_approved() => {
                let mut url = self.site.doc_path(&translation.locale, &translation.slug);
                if !params.is_empty() {
                    url = format!("{url}?{}", params.to_query_string());
                }
                Ok(Some(MissOutcome::Redirect {
                    url,
                    never_cache: false,
                }))
            }
            Some(_) if fallback_approved => Ok(Some(MissOutcome::Fallback {
                bundle: fallback,
                reason: Some(FallbackReason::TranslationNotApproved),
            })),
            None if fallback_approved => Ok(Some(MissOutcome::Fallback {
                bundle: fallback,
                reason: Some(FallbackReason::NoTranslation),
            })),
            // The default-locale document itself is unapproved; no fallback
            // is offered.
            _ => Ok(None),
        }
    }

    async fn deleted_parent_redirect(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Option<String>, AppError> {
        let parents = self
            .documents
            .deleted_document_parents(locale, slug)
            .await
            .map_err(map_repo)?;

        Ok(parents
            .first()
            .map(|parent| self.site.doc_path(&parent.locale, &parent.slug)))
    }

    /// Authenticated callers with no content-addressing parameters are sent
    /// to the creation flow instead of a 404.
    async fn create_redirect(
        &self,
        locale: &str,
        slug: &str,
        parts: &SlugParts,
        params: &RequestParams,
        caller: &Caller,
    ) -> Result<MissOutcome, AppError> {
        let blocked = CONTENT_ADDRESSING_PARAMS
            .iter()
            .copied()
            .any(|param| params.has(param));
        if blocked || !caller.is_authenticated() {
            return Ok(MissOutcome::NotFound);
        }

        let create_path = format!("/docs/{locale}/new");
        let url = if parts.length > 1 {
            let Some(mut parent) = self
                .documents
                .find_stub(locale, &parts.parent)
                .await
                .map_err(map_repo)?
            else {
                return Ok(MissOutcome::NotFound);
            };

            if parent.is_redirect {
                // Chase the redirect one hop; a redirect pointing at nothing
                // cannot host subpages.
                let target = match parent.parent_id {
                    Some(target_id) => self
                        .documents
                        .find_stub_by_id(target_id)
                        .await
                        .map_err(map_repo)?,
                    None => None,
                };
                match target {
                    Some(target) => parent = target,
                    None => return Ok(MissOutcome::NotFound),
                }
            }

            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("parent", &parent.id.to_string())
                .append_pair("slug", &parts.specific)
                .finish();
            format!("{create_path}?{query}")
        } else {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("slug", slug)
                .finish();
            format!("{create_path}?{query}")
        };

        Ok(MissOutcome::Redirect {
            url,
            never_cache: true,
        })
    }
}
