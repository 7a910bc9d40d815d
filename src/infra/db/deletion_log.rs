use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{DeletionLogRepo, RepoError};
use crate::domain::entities::DeletionLogRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct DeletionLogRow {
    id: Uuid,
    locale: String,
    slug: String,
    parent_slug: Option<String>,
    deleted_by: String,
    reason: String,
    created: OffsetDateTime,
}

impl From<DeletionLogRow> for DeletionLogRecord {
    fn from(row: DeletionLogRow) -> Self {
        Self {
            id: row.id,
            locale: row.locale,
            slug: row.slug,
            parent_slug: row.parent_slug,
            deleted_by: row.deleted_by,
            reason: row.reason,
            created: row.created,
        }
    }
}

#[async_trait]
impl DeletionLogRepo for PostgresRepositories {
    async fn list_entries(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Vec<DeletionLogRecord>, RepoError> {
        let rows = sqlx::query_as::<_, DeletionLogRow>(
            "SELECT id, locale, slug, parent_slug, deleted_by, reason, created \
             FROM wiki_deletion_log \
             WHERE locale = $1 AND slug = $2 \
             ORDER BY created DESC",
        )
        .bind(locale)
        .bind(slug)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DeletionLogRecord::from).collect())
    }
}
