use crate::domain::{
    models::job::{Job, JobStatus},
    ports::JobRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PostgresJobRepo {
    pool: PgPool,
}

impl PostgresJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepo {
    async fn enqueue(&self, job: &Job) -> Result<Job, AppError> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, ticket_id, kind, status, attempts, run_at, claimed_at, last_error, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING *"
        )
            .bind(&job.id)
            .bind(&job.ticket_id)
            .bind(job.kind.as_str())
            .bind(job.status.as_str())
            .bind(job.attempts)
            .bind(job.run_at)
            .bind(job.claimed_at)
            .bind(&job.last_error)
            .bind(job.created_at)
            .bind(job.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    // SKIP LOCKED lets several workers drain the queue without blocking on
    // each other's batches.
    async fn claim_due(&self, now: DateTime<Utc>, stale_before: DateTime<Utc>, limit: i64) -> Result<Vec<Job>, AppError> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'PROCESSING', claimed_at = $1, attempts = attempts + 1, updated_at = $1
            WHERE id IN (
                SELECT id
                FROM jobs
                WHERE (status = 'PENDING' AND run_at <= $1)
                   OR (status = 'PROCESSING' AND claimed_at <= $2)
                ORDER BY run_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#
        )
            .bind(now)
            .bind(stale_before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_for_ticket(&self, ticket_id: &str) -> Result<Vec<Job>, AppError> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE ticket_id = $1 ORDER BY created_at ASC, id ASC")
            .bind(ticket_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn finish(&self, job: &Job, status: JobStatus, note: Option<&str>, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = $1, last_error = $2, claimed_at = NULL, updated_at = $3
             WHERE id = $4 AND status = 'PROCESSING' AND attempts = $5"
        )
            .bind(status.as_str())
            .bind(note)
            .bind(now)
            .bind(&job.id)
            .bind(job.attempts)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }

    async fn reschedule(&self, job: &Job, run_at: DateTime<Utc>, error: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'PENDING', run_at = $1, last_error = $2, claimed_at = NULL, updated_at = $3
             WHERE id = $4 AND status = 'PROCESSING' AND attempts = $5"
        )
            .bind(run_at)
            .bind(error)
            .bind(now)
            .bind(&job.id)
            .bind(job.attempts)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }

    async fn cancel_pending_for_ticket(&self, ticket_id: &str, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'CANCELLED', updated_at = $1 WHERE ticket_id = $2 AND status = 'PENDING'"
        )
            .bind(now)
            .bind(ticket_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
