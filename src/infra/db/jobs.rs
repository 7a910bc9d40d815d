use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};
use crate::domain::types::JobState;

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl JobsRepo for PostgresRepositories {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO wiki_jobs (id, job_type, payload, state, run_at, max_attempts) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&id)
        .bind(job.job_type.as_str())
        .bind(&job.payload)
        .bind(JobState::Pending.as_str())
        .bind(job.run_at)
        .bind(job.max_attempts)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }
}
