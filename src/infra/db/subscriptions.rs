use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{RepoError, SubscriptionsRepo};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl SubscriptionsRepo for PostgresRepositories {
    async fn toggle(
        &self,
        username: &str,
        document_id: Uuid,
        in_tree: bool,
    ) -> Result<bool, RepoError> {
        let deleted = sqlx::query(
            "DELETE FROM wiki_subscriptions \
             WHERE username = $1 AND document_id = $2 AND in_tree = $3",
        )
        .bind(username)
        .bind(document_id)
        .bind(in_tree)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if deleted.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO wiki_subscriptions (username, document_id, in_tree) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(username)
        .bind(document_id)
        .bind(in_tree)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(true)
    }
}
