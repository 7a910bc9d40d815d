use async_trait::async_trait;
use sqlx::postgres::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{DocumentsRepo, RepoError};
use crate::domain::entities::{
    CreatorRecord, DocumentBundle, DocumentRecord, DocumentStub, RevisionRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const DOCUMENT_COLUMNS: &str = "id, locale, slug, title, html, rendered_html, rendered_errors, \
     body_html, toc_html, summary_html, summary_text, quick_links_html, \
     is_redirect, is_localizable, parent_id, parent_topic_id, \
     current_revision_id, deleted_at";

const STUB_COLUMNS: &str =
    "id, locale, slug, title, is_redirect, parent_id, parent_topic_id, current_revision_id";

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    locale: String,
    slug: String,
    title: String,
    html: String,
    rendered_html: String,
    rendered_errors: Option<String>,
    body_html: String,
    toc_html: String,
    summary_html: String,
    summary_text: String,
    quick_links_html: String,
    is_redirect: bool,
    is_localizable: bool,
    parent_id: Option<Uuid>,
    parent_topic_id: Option<Uuid>,
    current_revision_id: Option<Uuid>,
    deleted_at: Option<OffsetDateTime>,
}

impl From<DocumentRow> for DocumentRecord {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            locale: row.locale,
            slug: row.slug,
            title: row.title,
            html: row.html,
            rendered_html: row.rendered_html,
            rendered_errors: row.rendered_errors,
            body_html: row.body_html,
            toc_html: row.toc_html,
            summary_html: row.summary_html,
            summary_text: row.summary_text,
            quick_links_html: row.quick_links_html,
            is_redirect: row.is_redirect,
            is_localizable: row.is_localizable,
            parent_id: row.parent_id,
            parent_topic_id: row.parent_topic_id,
            current_revision_id: row.current_revision_id,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StubRow {
    id: Uuid,
    locale: String,
    slug: String,
    title: String,
    is_redirect: bool,
    parent_id: Option<Uuid>,
    parent_topic_id: Option<Uuid>,
    current_revision_id: Option<Uuid>,
}

impl From<StubRow> for DocumentStub {
    fn from(row: StubRow) -> Self {
        Self {
            id: row.id,
            locale: row.locale,
            slug: row.slug,
            title: row.title,
            is_redirect: row.is_redirect,
            parent_id: row.parent_id,
            parent_topic_id: row.parent_topic_id,
            current_revision_id: row.current_revision_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RevisionRow {
    id: Uuid,
    document_id: Uuid,
    creator_id: Uuid,
    creator_username: String,
    creator_is_active: bool,
    created: OffsetDateTime,
    toc_depth: i32,
    translation_age: i32,
    localization_in_progress: bool,
}

impl From<RevisionRow> for RevisionRecord {
    fn from(row: RevisionRow) -> Self {
        Self {
            id: row.id,
            document_id: row.document_id,
            creator: CreatorRecord {
                id: row.creator_id,
                username: row.creator_username,
                is_active: row.creator_is_active,
            },
            created: row.created,
            toc_depth: row.toc_depth,
            translation_age: row.translation_age,
            localization_in_progress: row.localization_in_progress,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CreatorRow {
    creator_id: Uuid,
    creator_username: String,
    creator_is_active: bool,
}

impl PostgresRepositories {
    async fn load_bundle(
        pool: &PgPool,
        record: DocumentRecord,
    ) -> Result<DocumentBundle, RepoError> {
        let current_revision = match record.current_revision_id {
            Some(revision_id) => sqlx::query_as::<_, RevisionRow>(
                "SELECT id, document_id, creator_id, creator_username, creator_is_active, \
                 created, toc_depth, translation_age, localization_in_progress \
                 FROM wiki_revisions WHERE id = $1",
            )
            .bind(revision_id)
            .fetch_optional(pool)
            .await
            .map_err(map_sqlx_error)?
            .map(RevisionRecord::from),
            None => None,
        };

        let parent = Self::stub_by_id(pool, record.parent_id).await?;
        let parent_topic = Self::stub_by_id(pool, record.parent_topic_id).await?;

        Ok(DocumentBundle {
            document: record,
            current_revision,
            parent,
            parent_topic,
        })
    }

    async fn stub_by_id(pool: &PgPool, id: Option<Uuid>) -> Result<Option<DocumentStub>, RepoError> {
        let Some(id) = id else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, StubRow>(&format!(
            "SELECT {STUB_COLUMNS} FROM wiki_documents WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(DocumentStub::from))
    }

    async fn bundle_for_row(
        &self,
        row: Option<DocumentRow>,
    ) -> Result<Option<DocumentBundle>, RepoError> {
        match row {
            Some(row) => Ok(Some(
                Self::load_bundle(self.pool(), DocumentRecord::from(row)).await?,
            )),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DocumentsRepo for PostgresRepositories {
    async fn find_bundle(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Option<DocumentBundle>, RepoError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM wiki_documents \
             WHERE locale = $1 AND slug = $2 AND deleted_at IS NULL"
        ))
        .bind(locale)
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.bundle_for_row(row).await
    }

    async fn find_bundle_by_id(&self, id: Uuid) -> Result<Option<DocumentBundle>, RepoError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM wiki_documents WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.bundle_for_row(row).await
    }

    async fn find_bundle_by_title(
        &self,
        locale: &str,
        title: &str,
    ) -> Result<Option<DocumentBundle>, RepoError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM wiki_documents \
             WHERE locale = $1 AND title = $2 AND deleted_at IS NULL"
        ))
        .bind(locale)
        .bind(title)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.bundle_for_row(row).await
    }

    async fn find_stub(&self, locale: &str, slug: &str) -> Result<Option<DocumentStub>, RepoError> {
        let row = sqlx::query_as::<_, StubRow>(&format!(
            "SELECT {STUB_COLUMNS} FROM wiki_documents \
             WHERE locale = $1 AND slug = $2 AND deleted_at IS NULL"
        ))
        .bind(locale)
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(DocumentStub::from))
    }

    async fn find_stub_by_id(&self, id: Uuid) -> Result<Option<DocumentStub>, RepoError> {
        Self::stub_by_id(self.pool(), Some(id)).await
    }

    async fn find_translation(
        &self,
        source_id: Uuid,
        locale: &str,
    ) -> Result<Option<DocumentStub>, RepoError> {
        let row = sqlx::query_as::<_, StubRow>(&format!(
            "SELECT {STUB_COLUMNS} FROM wiki_documents \
             WHERE parent_id = $1 AND locale = $2 AND deleted_at IS NULL"
        ))
        .bind(source_id)
        .bind(locale)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(DocumentStub::from))
    }

    async fn list_other_translations(
        &self,
        document_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<Vec<DocumentStub>, RepoError> {
        let family_root = parent_id.unwrap_or(document_id);
        let rows = sqlx::query_as::<_, StubRow>(&format!(
            "SELECT {STUB_COLUMNS} FROM wiki_documents \
             WHERE (id = $1 OR parent_id = $1) AND id <> $2 AND deleted_at IS NULL \
             ORDER BY locale"
        ))
        .bind(family_root)
        .bind(document_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(DocumentStub::from).collect())
    }

    async fn list_children(
        &self,
        parent_topic_id: Uuid,
    ) -> Result<Vec<DocumentBundle>, RepoError> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM wiki_documents \
             WHERE parent_topic_id = $1 AND deleted_at IS NULL ORDER BY title"
        ))
        .bind(parent_topic_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut bundles = Vec::with_capacity(rows.len());
        for row in rows {
            bundles.push(Self::load_bundle(self.pool(), DocumentRecord::from(row)).await?);
        }
        Ok(bundles)
    }

    async fn list_contributors(&self, document_id: Uuid) -> Result<Vec<CreatorRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CreatorRow>(
            "SELECT creator_id, creator_username, creator_is_active FROM ( \
                 SELECT DISTINCT ON (creator_id) \
                        creator_id, creator_username, creator_is_active, created \
                 FROM wiki_revisions \
                 WHERE document_id = $1 AND creator_is_active \
                 ORDER BY creator_id, created DESC \
             ) contributors ORDER BY created DESC",
        )
        .bind(document_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| CreatorRecord {
                id: row.creator_id,
                username: row.creator_username,
                is_active: row.creator_is_active,
            })
            .collect())
    }

    async fn deleted_document_exists(&self, locale: &str, slug: &str) -> Result<bool, RepoError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM wiki_documents \
                 WHERE locale = $1 AND slug = $2 AND deleted_at IS NOT NULL \
             )",
        )
        .bind(locale)
        .bind(slug)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(exists)
    }

    async fn deleted_document_parents(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Vec<DocumentStub>, RepoError> {
        let rows = sqlx::query_as::<_, StubRow>(
            "SELECT p.id, p.locale, p.slug, p.title, p.is_redirect, \
                    p.parent_id, p.parent_topic_id, p.current_revision_id \
             FROM wiki_documents d \
             JOIN wiki_documents p ON p.id = d.parent_id \
             WHERE d.locale = $1 AND d.slug = $2 \
               AND d.deleted_at IS NOT NULL AND p.deleted_at IS NULL \
             ORDER BY d.deleted_at DESC",
        )
        .bind(locale)
        .bind(slug)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(DocumentStub::from).collect())
    }

    async fn list_tree_slugs(&self, root_id: Uuid) -> Result<Vec<String>, RepoError> {
        let slugs: Vec<String> = sqlx::query_scalar(
            "WITH RECURSIVE tree AS ( \
                 SELECT id, slug FROM wiki_documents WHERE id = $1 \
                 UNION ALL \
                 SELECT d.id, d.slug FROM wiki_documents d \
                 JOIN tree t ON d.parent_topic_id = t.id \
                 WHERE d.deleted_at IS NULL \
             ) SELECT slug FROM tree",
        )
        .bind(root_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(slugs)
    }

    async fn find_live_slugs(
        &self,
        locale: &str,
        slugs: &[String],
    ) -> Result<Vec<String>, RepoError> {
        let found: Vec<String> = sqlx::query_scalar(
            "SELECT slug FROM wiki_documents \
             WHERE locale = $1 AND slug = ANY($2) AND deleted_at IS NULL",
        )
        .bind(locale)
        .bind(slugs)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(found)
    }
}
