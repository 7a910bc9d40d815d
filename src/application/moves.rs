//! Tree-move workflow.
//!
//! Conflict detection runs synchronously: every slug in the tree is rebased
//! onto the requested target and checked against live documents. The move
//! itself is enqueued for the external executor; this service's
//! responsibility ends at submission.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::application::documents::map_repo;
use crate::application::error::AppError;
use crate::application::repos::{DocumentsRepo, JobsRepo, NewJobRecord};
use crate::domain::entities::DocumentBundle;
use crate::domain::slug::{SlugError, validate_move_slug};
use crate::domain::types::JobType;

const SOURCE: &str = "application::moves::TreeMoveService";
const MOVE_JOB_MAX_ATTEMPTS: i32 = 3;

/// Payload handed to the external move executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveTreePayload {
    pub locale: String,
    pub slug: String,
    pub new_slug: String,
    pub requested_by: String,
}

/// Outcome of a validated move request.
#[derive(Debug)]
pub enum MoveRequestOutcome {
    /// The move was enqueued under the returned job id.
    Enqueued { job_id: String },
    /// Target slugs that collide with live documents; nothing was moved.
    Conflicts(Vec<String>),
    /// The target slug itself is unusable.
    InvalidSlug(SlugError),
}

pub struct TreeMoveService {
    documents: Arc<dyn DocumentsRepo>,
    jobs: Arc<dyn JobsRepo>,
}

impl TreeMoveService {
    pub fn new(documents: Arc<dyn DocumentsRepo>, jobs: Arc<dyn JobsRepo>) -> Self {
        Self { documents, jobs }
    }

    /// How many live documents sit beneath this one.
    pub async fn descendant_count(&self, bundle: &DocumentBundle) -> Result<usize, AppError> {
        let tree_slugs = self
            .documents
            .list_tree_slugs(bundle.document.id)
            .await
            .map_err(map_repo)?;
        Ok(tree_slugs.len().saturating_sub(1))
    }

    /// Slugs that would collide if `bundle`'s tree were rebased onto
    /// `new_slug`.
    pub async fn tree_conflicts(
        &self,
        bundle: &DocumentBundle,
        new_slug: &str,
    ) -> Result<Vec<String>, AppError> {
        let tree_slugs = self
            .documents
            .list_tree_slugs(bundle.document.id)
            .await
            .map_err(map_repo)?;

        let old_prefix = bundle.document.slug.as_str();
        let rebased: Vec<String> = tree_slugs
            .iter()
            .map(|slug| rebase_slug(slug, old_prefix, new_slug))
            .collect();

        if rebased.is_empty() {
            return Ok(Vec::new());
        }

        let mut conflicts = self
            .documents
            .find_live_slugs(&bundle.document.locale, &rebased)
            .await
            .map_err(map_repo)?;
        // Members of the moving tree vacate their slugs; they cannot
        // conflict with themselves.
        let moving: std::collections::HashSet<&str> =
            tree_slugs.iter().map(String::as_str).collect();
        conflicts.retain(|candidate| !moving.contains(candidate.as_str()));
        conflicts.sort();
        Ok(conflicts)
    }

    /// Validate the target, report conflicts, or enqueue the move.
    pub async fn request_move(
        &self,
        bundle: &DocumentBundle,
        new_slug: &str,
        requested_by: &str,
    ) -> Result<MoveRequestOutcome, AppError> {
        if let Err(err) = validate_move_slug(new_slug) {
            return Ok(MoveRequestOutcome::InvalidSlug(err));
        }

        let conflicts = self.tree_conflicts(bundle, new_slug).await?;
        if !conflicts.is_empty() {
            return Ok(MoveRequestOutcome::Conflicts(conflicts));
        }

        let payload = MoveTreePayload {
            locale: bundle.document.locale.clone(),
            slug: bundle.document.slug.clone(),
            new_slug: new_slug.to_string(),
            requested_by: requested_by.to_string(),
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|err| AppError::unexpected(err.to_string()))?;

        let job_id = self
            .jobs
            .enqueue_job(NewJobRecord {
                job_type: JobType::MoveTree,
                payload,
                run_at: OffsetDateTime::now_utc(),
                max_attempts: MOVE_JOB_MAX_ATTEMPTS,
            })
            .await
            .map_err(map_repo)?;

        info!(
            target = SOURCE,
            locale = %bundle.document.locale,
            slug = %bundle.document.slug,
            new_slug = %new_slug,
            job_id = %job_id,
            "tree move enqueued"
        );

        Ok(MoveRequestOutcome::Enqueued { job_id })
    }
}

/// Rebase a tree member's slug from the old root prefix onto the new one.
fn rebase_slug(slug: &str, old_prefix: &str, new_prefix: &str) -> String {
    match slug.strip_prefix(old_prefix) {
        Some(rest) => format!("{new_prefix}{rest}"),
        None => slug.to_string(),
    }
}
