use crate::domain::{
    models::event::PricingType,
    models::ticket::{AdmissionOutcome, Ticket, TicketFilter},
    ports::TicketRepository,
};
use crate::error::AppError;
use crate::infra::repositories::{contains_pattern, unique_violation, UniqueViolation, LIKE_ESCAPE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

pub struct PostgresTicketRepo {
    pool: PgPool,
}

impl PostgresTicketRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn filtered(select: &str, filter: &TicketFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(select);
    qb.push(" WHERE deleted_at IS NULL");
    if let Some(event_id) = &filter.event_id {
        qb.push(" AND event_id = ").push_bind(event_id.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(checkin_status) = filter.checkin_status {
        qb.push(" AND checkin_status = ").push_bind(checkin_status.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = contains_pattern(search);
        qb.push(" AND (lower(full_name) LIKE ").push_bind(pattern.clone()).push(LIKE_ESCAPE)
            .push(" OR lower(email) LIKE ").push_bind(pattern.clone()).push(LIKE_ESCAPE)
            .push(" OR lower(COALESCE(whatsapp, '')) LIKE ").push_bind(pattern.clone()).push(LIKE_ESCAPE)
            .push(" OR lower(ticket_code) LIKE ").push_bind(pattern).push(LIKE_ESCAPE)
            .push(")");
    }
    qb
}

#[async_trait]
impl TicketRepository for PostgresTicketRepo {
    // Locking the event row serializes admissions per event; the duplicate
    // check and seat count then run against a stable set of tickets.
    async fn admit(&self, draft: &Ticket, pricing: PricingType) -> Result<AdmissionOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let event: Option<(Option<i64>,)> = sqlx::query_as(
            "SELECT capacity FROM events WHERE id = $1 AND is_published AND deleted_at IS NULL FOR UPDATE"
        )
            .bind(&draft.event_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        let Some((capacity,)) = event else {
            return Ok(AdmissionOutcome::EventUnavailable);
        };

        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tickets WHERE event_id = $1 AND email = $2 AND deleted_at IS NULL AND status IN ('PENDING', 'CONFIRMED'))"
        )
            .bind(&draft.event_id)
            .bind(&draft.email)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if duplicate {
            return Ok(AdmissionOutcome::Duplicate);
        }

        if let Some(capacity) = capacity {
            let counted: Vec<String> = pricing.capacity_counted_statuses().iter().map(|s| s.as_str().to_string()).collect();
            let occupied: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM tickets WHERE event_id = $1 AND deleted_at IS NULL AND status = ANY($2)"
            )
                .bind(&draft.event_id)
                .bind(counted)
                .fetch_one(&mut *tx)
                .await
                .map_err(AppError::Database)?;
            if occupied >= capacity {
                return Ok(AdmissionOutcome::SoldOut);
            }
        }

        let inserted = sqlx::query_as::<_, Ticket>(
            "INSERT INTO tickets (id, event_id, full_name, email, whatsapp, school_or_campus, class_or_semester, domicile,
                                  ticket_code, qr_url, status, checkin_status, checked_in_at, total_price, payment_method,
                                  payment_reference, paid_at, expires_at, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NULL, $13, $14, $15, $16, $17, $18, $19, NULL)
             RETURNING *"
        )
            .bind(&draft.id)
            .bind(&draft.event_id)
            .bind(&draft.full_name)
            .bind(&draft.email)
            .bind(&draft.whatsapp)
            .bind(&draft.school_or_campus)
            .bind(&draft.class_or_semester)
            .bind(&draft.domicile)
            .bind(&draft.ticket_code)
            .bind(&draft.qr_url)
            .bind(draft.status.as_str())
            .bind(draft.checkin_status.as_str())
            .bind(draft.total_price)
            .bind(&draft.payment_method)
            .bind(&draft.payment_reference)
            .bind(draft.paid_at)
            .bind(draft.expires_at)
            .bind(draft.created_at)
            .bind(draft.updated_at)
            .fetch_one(&mut *tx)
            .await;

        match inserted {
            Ok(ticket) => {
                tx.commit().await.map_err(AppError::Database)?;
                Ok(AdmissionOutcome::Admitted(ticket))
            }
            Err(e) => match unique_violation(&e) {
                Some(UniqueViolation::TicketCode) => Ok(AdmissionOutcome::CodeCollision),
                Some(UniqueViolation::ActiveRegistration) => Ok(AdmissionOutcome::Duplicate),
                _ => Err(AppError::Database(e)),
            },
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE ticket_code = $1 AND deleted_at IS NULL")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), AppError> {
        let total: i64 = filtered("SELECT COUNT(*) FROM tickets", filter)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let mut qb = filtered("SELECT * FROM tickets", filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(filter.limit)
            .push(" OFFSET ").push_bind(filter.offset);
        let tickets = qb.build_query_as::<Ticket>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok((tickets, total))
    }

    async fn update(&self, ticket: &Ticket, read: &Ticket) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET status = $1, checkin_status = $2, checked_in_at = $3, total_price = $4, payment_method = $5,
                                payment_reference = $6, paid_at = $7, expires_at = $8, updated_at = $9
             WHERE id = $10 AND status = $11 AND checkin_status = $12 AND deleted_at IS NULL
             RETURNING *"
        )
            .bind(ticket.status.as_str())
            .bind(ticket.checkin_status.as_str())
            .bind(ticket.checked_in_at)
            .bind(ticket.total_price)
            .bind(&ticket.payment_method)
            .bind(&ticket.payment_reference)
            .bind(ticket.paid_at)
            .bind(ticket.expires_at)
            .bind(ticket.updated_at)
            .bind(&ticket.id)
            .bind(read.status.as_str())
            .bind(read.checkin_status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn mark_checked_in(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET checkin_status = 'CHECKED_IN', checked_in_at = $1, updated_at = $1
             WHERE id = $2 AND status = 'CONFIRMED' AND checkin_status = 'NOT_CHECKED_IN' AND deleted_at IS NULL
             RETURNING *"
        )
            .bind(at)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE tickets SET deleted_at = $1, updated_at = $1 WHERE id = $2 AND deleted_at IS NULL")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Ticket not found".into()));
        }
        Ok(())
    }

    async fn cancel_expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            "UPDATE tickets SET status = 'CANCELLED', updated_at = $1
             WHERE status = 'PENDING' AND deleted_at IS NULL AND expires_at IS NOT NULL AND expires_at < $1
             RETURNING id"
        )
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
