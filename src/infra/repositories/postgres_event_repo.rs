use crate::domain::{models::event::Event, ports::EventRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;

pub struct PostgresEventRepo {
    pool: PgPool,
}

impl PostgresEventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PostgresEventRepo {
    async fn create(&self, event: &Event) -> Result<Event, AppError> {
        sqlx::query_as::<_, Event>(
            "INSERT INTO events (id, title, title_translations, location, starts_at, ends_at, capacity, pricing_type, ticket_price, is_published, created_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING *"
        )
            .bind(&event.id)
            .bind(&event.title)
            .bind(&event.title_translations)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.ends_at)
            .bind(event.capacity)
            .bind(event.pricing_type.as_str())
            .bind(event.ticket_price)
            .bind(event.is_published)
            .bind(event.created_at)
            .bind(event.deleted_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Event>, AppError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_published(&self, id: &str) -> Result<Option<Event>, AppError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 AND is_published AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(())
    }
}
