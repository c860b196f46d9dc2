use crate::domain::{models::rate_limit::RateLimitBucket, ports::RateLimitRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;

pub struct PostgresRateLimitRepo {
    pool: PgPool,
}

impl PostgresRateLimitRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitRepository for PostgresRateLimitRepo {
    // `excluded.window_start_ms` is the current time of this hit.
    async fn hit(&self, key: &str, now_ms: i64, window_ms: i64) -> Result<RateLimitBucket, AppError> {
        sqlx::query_as::<_, RateLimitBucket>(
            r#"
            INSERT INTO rate_limit_buckets (bucket_key, window_start_ms, expires_at_ms, count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (bucket_key) DO UPDATE SET
                count = CASE WHEN rate_limit_buckets.expires_at_ms <= excluded.window_start_ms
                             THEN 1 ELSE rate_limit_buckets.count + 1 END,
                window_start_ms = CASE WHEN rate_limit_buckets.expires_at_ms <= excluded.window_start_ms
                                       THEN excluded.window_start_ms ELSE rate_limit_buckets.window_start_ms END,
                expires_at_ms = CASE WHEN rate_limit_buckets.expires_at_ms <= excluded.window_start_ms
                                     THEN excluded.expires_at_ms ELSE rate_limit_buckets.expires_at_ms END
            RETURNING bucket_key, window_start_ms, expires_at_ms, count
            "#
        )
            .bind(key)
            .bind(now_ms)
            .bind(now_ms + window_ms)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM rate_limit_buckets WHERE expires_at_ms <= $1")
            .bind(now_ms)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
