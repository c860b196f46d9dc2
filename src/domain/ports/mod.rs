use crate::domain::models::{
    event::{Event, PricingType},
    job::{Job, JobStatus},
    rate_limit::RateLimitBucket,
    ticket::{AdmissionOutcome, Ticket, TicketFilter},
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &Event) -> Result<Event, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Event>, AppError>;
    async fn find_published(&self, id: &str) -> Result<Option<Event>, AppError>;
    /// Cheap round trip used by the health check.
    async fn ping(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Duplicate check, capacity count and insert as one atomic unit,
    /// serialized per event.
    async fn admit(&self, draft: &Ticket, pricing: PricingType) -> Result<AdmissionOutcome, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Ticket>, AppError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Ticket>, AppError>;
    async fn list(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), AppError>;
    /// Writes the mutable fields of `ticket` back, guarded on the status and
    /// check-in state of `read`, the row the caller patched. Returns `None`
    /// when either moved or the ticket vanished in the meantime.
    async fn update(&self, ticket: &Ticket, read: &Ticket) -> Result<Option<Ticket>, AppError>;
    /// Flips check-in only for confirmed, not yet checked-in tickets.
    /// Returns `None` when the guard did not match.
    async fn mark_checked_in(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Ticket>, AppError>;
    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<(), AppError>;
    async fn cancel_expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<String>, AppError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn enqueue(&self, job: &Job) -> Result<Job, AppError>;
    /// Leases up to `limit` jobs due at `now` and counts an attempt on each.
    /// PROCESSING jobs claimed before `stale_before` are taken back.
    async fn claim_due(&self, now: DateTime<Utc>, stale_before: DateTime<Utc>, limit: i64) -> Result<Vec<Job>, AppError>;
    async fn list_for_ticket(&self, ticket_id: &str) -> Result<Vec<Job>, AppError>;
    /// Records a final status for the claim `job` came from. Returns `false`
    /// when the lease was taken over in the meantime.
    async fn finish(&self, job: &Job, status: JobStatus, note: Option<&str>, now: DateTime<Utc>) -> Result<bool, AppError>;
    /// Puts a failed claim back in line for `run_at`. Same lease rule as `finish`.
    async fn reschedule(&self, job: &Job, run_at: DateTime<Utc>, error: &str, now: DateTime<Utc>) -> Result<bool, AppError>;
    async fn cancel_pending_for_ticket(&self, ticket_id: &str, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Atomically counts one hit against `key`, starting a fresh window when
    /// the stored one has elapsed.
    async fn hit(&self, key: &str, now_ms: i64, window_ms: i64) -> Result<RateLimitBucket, AppError>;
    async fn purge_expired(&self, now_ms: i64) -> Result<u64, AppError>;
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str, attachment_name: Option<&str>, attachment_data: Option<&[u8]>) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Confirmation,
    Resend,
}

/// Schedules delivery of a ticket message. Implementations must not wait
/// for the message to be delivered.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn schedule(&self, ticket: &Ticket, kind: NotificationKind) -> Result<(), AppError>;
}

pub trait TicketCodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}
