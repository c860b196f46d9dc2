use crate::domain::{
    models::event::PricingType,
    models::ticket::{AdmissionOutcome, Ticket, TicketFilter},
    ports::TicketRepository,
};
use crate::error::AppError;
use crate::infra::repositories::{contains_pattern, unique_violation, UniqueViolation, LIKE_ESCAPE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

pub struct SqliteTicketRepo {
    pool: SqlitePool,
}

impl SqliteTicketRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Works out why the guarded insert matched no row. Runs after that
    /// statement, so it only labels the rejection: a duplicate cancelled in
    /// between is reported as `SoldOut`. No seat is ever granted here.
    async fn diagnose_rejection(&self, draft: &Ticket) -> Result<AdmissionOutcome, AppError> {
        let admissible: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM events WHERE id = ? AND is_published = 1 AND deleted_at IS NULL"
        )
            .bind(&draft.event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;
        if admissible.is_none() {
            return Ok(AdmissionOutcome::EventUnavailable);
        }

        let duplicate: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tickets WHERE event_id = ? AND email = ? AND deleted_at IS NULL AND status IN ('PENDING', 'CONFIRMED'))"
        )
            .bind(&draft.event_id)
            .bind(&draft.email)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(if duplicate != 0 { AdmissionOutcome::Duplicate } else { AdmissionOutcome::SoldOut })
    }
}

/// Shared WHERE clause of the admin listing and its count query.
fn filtered(select: &str, filter: &TicketFilter) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::<Sqlite>::new(select);
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
impl TicketRepository for SqliteTicketRepo {
    // A single INSERT .. SELECT takes the write lock up front, so the
    // duplicate and capacity predicates see every committed admission.
    async fn admit(&self, draft: &Ticket, pricing: PricingType) -> Result<AdmissionOutcome, AppError> {
        let counted = pricing.capacity_counted_statuses();
        let placeholders = vec!["?"; counted.len()].join(", ");
        let sql = format!(
            r#"
            INSERT INTO tickets (id, event_id, full_name, email, whatsapp, school_or_campus, class_or_semester, domicile,
                                 ticket_code, qr_url, status, checkin_status, checked_in_at, total_price, payment_method,
                                 payment_reference, paid_at, expires_at, created_at, updated_at, deleted_at)
            SELECT ?, e.id, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, NULL
            FROM events e
            WHERE e.id = ?
              AND e.is_published = 1
              AND e.deleted_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM tickets d
                  WHERE d.event_id = e.id AND d.email = ? AND d.deleted_at IS NULL
                    AND d.status IN ('PENDING', 'CONFIRMED')
              )
              AND (
                  e.capacity IS NULL
                  OR (SELECT COUNT(*) FROM tickets c
                      WHERE c.event_id = e.id AND c.deleted_at IS NULL AND c.status IN ({placeholders})) < e.capacity
              )
            RETURNING *
            "#
        );

        let mut query = sqlx::query_as::<_, Ticket>(&sql)
            .bind(&draft.id)
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
            .bind(&draft.event_id)
            .bind(&draft.email);
        for status in counted {
            query = query.bind(status.as_str());
        }

        match query.fetch_optional(&self.pool).await {
            Ok(Some(ticket)) => Ok(AdmissionOutcome::Admitted(ticket)),
            Ok(None) => self.diagnose_rejection(draft).await,
            Err(e) => match unique_violation(&e) {
                Some(UniqueViolation::TicketCode) => Ok(AdmissionOutcome::CodeCollision),
                Some(UniqueViolation::ActiveRegistration) => {
                    debug!(event_id = %draft.event_id, "active registration index rejected insert");
                    Ok(AdmissionOutcome::Duplicate)
                }
                _ => Err(AppError::Database(e)),
            },
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Ticket>, AppError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE ticket_code = ? AND deleted_at IS NULL")
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
            "UPDATE tickets SET status = ?, checkin_status = ?, checked_in_at = ?, total_price = ?, payment_method = ?,
                                payment_reference = ?, paid_at = ?, expires_at = ?, updated_at = ?
             WHERE id = ? AND status = ? AND checkin_status = ? AND deleted_at IS NULL
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
            "UPDATE tickets SET checkin_status = 'CHECKED_IN', checked_in_at = ?, updated_at = ?
             WHERE id = ? AND status = 'CONFIRMED' AND checkin_status = 'NOT_CHECKED_IN' AND deleted_at IS NULL
             RETURNING *"
        )
            .bind(at)
            .bind(at)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE tickets SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(at)
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
            "UPDATE tickets SET status = 'CANCELLED', updated_at = ?
             WHERE status = 'PENDING' AND deleted_at IS NULL AND expires_at IS NOT NULL AND expires_at < ?
             RETURNING id"
        )
            .bind(now)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
