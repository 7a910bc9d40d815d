//! Repository traits describing persistence adapters.
//!
//! The pipeline only reads documents; writes happen in external subsystems.
//! Everything here is a trait so services can be exercised against in-memory
//! implementations.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{CreatorRecord, DeletionLogRecord, DocumentBundle, DocumentStub};
use crate::domain::types::JobType;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read access to documents, their revisions, and their weak references.
#[async_trait]
pub trait DocumentsRepo: Send + Sync {
    /// Fetch a live document with its current revision, parent stub and
    /// parent-topic stub.
    async fn find_bundle(&self, locale: &str, slug: &str)
    -> Result<Option<DocumentBundle>, RepoError>;

    async fn find_bundle_by_id(&self, id: Uuid) -> Result<Option<DocumentBundle>, RepoError>;

    /// Lookup by title within a locale, used by the title-addressed JSON and
    /// TOC endpoints.
    async fn find_bundle_by_title(
        &self,
        locale: &str,
        title: &str,
    ) -> Result<Option<DocumentBundle>, RepoError>;

    async fn find_stub(&self, locale: &str, slug: &str) -> Result<Option<DocumentStub>, RepoError>;

    async fn find_stub_by_id(&self, id: Uuid) -> Result<Option<DocumentStub>, RepoError>;

    /// The translation of `source_id` into `locale`, when one exists.
    async fn find_translation(
        &self,
        source_id: Uuid,
        locale: &str,
    ) -> Result<Option<DocumentStub>, RepoError>;

    /// Every other member of the translation family of `document_id`: the
    /// family root (the document's parent, or the document itself) plus all
    /// of the root's translations, excluding `document_id`.
    async fn list_other_translations(
        &self,
        document_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<Vec<DocumentStub>, RepoError>;

    /// Immediate live descendants by hierarchical parent.
    async fn list_children(&self, parent_topic_id: Uuid)
    -> Result<Vec<DocumentBundle>, RepoError>;

    /// Distinct active revision authors, most recent contribution first.
    async fn list_contributors(&self, document_id: Uuid) -> Result<Vec<CreatorRecord>, RepoError>;

    /// Whether a soft-deleted document row exists at `(locale, slug)`.
    async fn deleted_document_exists(&self, locale: &str, slug: &str) -> Result<bool, RepoError>;

    /// Parents of soft-deleted documents at `(locale, slug)`, newest deletion
    /// first. Only live parents are returned.
    async fn deleted_document_parents(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Vec<DocumentStub>, RepoError>;

    /// Slugs of a document and all of its live descendants.
    async fn list_tree_slugs(&self, root_id: Uuid) -> Result<Vec<String>, RepoError>;

    /// Which of the given slugs are taken by live documents in `locale`.
    async fn find_live_slugs(
        &self,
        locale: &str,
        slugs: &[String],
    ) -> Result<Vec<String>, RepoError>;
}

#[async_trait]
pub trait DeletionLogRepo: Send + Sync {
    /// Deletion-log entries for `(locale, slug)`, newest first.
    async fn list_entries(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Vec<DeletionLogRecord>, RepoError>;
}

#[async_trait]
pub trait SubscriptionsRepo: Send + Sync {
    /// Toggle a subscription, returning `true` when the caller is now
    /// subscribed.
    async fn toggle(
        &self,
        username: &str,
        document_id: Uuid,
        in_tree: bool,
    ) -> Result<bool, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Enqueue a job for the external executor, returning the assigned id.
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
