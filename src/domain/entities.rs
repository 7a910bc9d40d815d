//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A wiki document as stored, addressed by `(locale, slug)`.
///
/// `html` is the author-saved source; `rendered_html` is the last successful
/// macro-expansion of that source and may be empty when the document has never
/// been rendered. The pre-split hunks (`body_html`, `toc_html`,
/// `summary_html`, `quick_links_html`) are maintained by the editing
/// subsystem alongside the rendered body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub locale: String,
    pub slug: String,
    pub title: String,
    pub html: String,
    pub rendered_html: String,
    pub rendered_errors: Option<String>,
    pub body_html: String,
    pub toc_html: String,
    pub summary_html: String,
    pub summary_text: String,
    pub quick_links_html: String,
    pub is_redirect: bool,
    pub is_localizable: bool,
    pub parent_id: Option<Uuid>,
    pub parent_topic_id: Option<Uuid>,
    pub current_revision_id: Option<Uuid>,
    pub deleted_at: Option<OffsetDateTime>,
}

/// Light projection of a document used for weak references: redirect and
/// translation targets, hierarchical parents, translation siblings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentStub {
    pub id: Uuid,
    pub locale: String,
    pub slug: String,
    pub title: String,
    pub is_redirect: bool,
    pub parent_id: Option<Uuid>,
    pub parent_topic_id: Option<Uuid>,
    pub current_revision_id: Option<Uuid>,
}

impl DocumentStub {
    /// Whether this document has an approved (current) revision.
    pub fn is_approved(&self) -> bool {
        self.current_revision_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatorRecord {
    pub id: Uuid,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub creator: CreatorRecord,
    pub created: OffsetDateTime,
    pub toc_depth: i32,
    pub translation_age: i32,
    pub localization_in_progress: bool,
}

/// A document together with the weak references the pipeline branches on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentBundle {
    pub document: DocumentRecord,
    pub current_revision: Option<RevisionRecord>,
    pub parent: Option<DocumentStub>,
    pub parent_topic: Option<DocumentStub>,
}

impl DocumentBundle {
    pub fn revision_id(&self) -> Option<Uuid> {
        self.document.current_revision_id
    }
}

/// Snapshot kept when a document is soft-deleted. Several entries may exist
/// for the same `(locale, slug)`; the newest one drives the restore view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionLogRecord {
    pub id: Uuid,
    pub locale: String,
    pub slug: String,
    pub parent_slug: Option<String>,
    pub deleted_by: String,
    pub reason: String,
    pub created: OffsetDateTime,
}
