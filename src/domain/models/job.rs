use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which ticket message a job delivers.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    TicketConfirmation,
    TicketResend,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::TicketConfirmation => "TICKET_CONFIRMATION",
            JobKind::TicketResend => "TICKET_RESEND",
        }
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TICKET_CONFIRMATION" => Ok(JobKind::TicketConfirmation),
            "TICKET_RESEND" => Ok(JobKind::TicketResend),
            other => Err(format!("unknown job kind {other}")),
        }
    }
}

impl TryFrom<String> for JobKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PENDING and PROCESSING are live; everything else is final.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Skipped => "SKIPPED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            "SKIPPED" => Ok(JobStatus::Skipped),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status {other}")),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued ticket message. `attempts` counts claims, so a worker that dies
/// mid-send still spends an attempt once its lease lapses.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Job {
    pub id: String,
    pub ticket_id: String,
    #[sqlx(try_from = "String")]
    pub kind: JobKind,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub attempts: i64,
    pub run_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(kind: JobKind, ticket_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            kind,
            status: JobStatus::Pending,
            attempts: 0,
            run_at: now,
            claimed_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_retry(&self, max_attempts: u32) -> bool {
        self.attempts < i64::from(max_attempts)
    }
}

/// Wait before the attempt after `attempts` failed ones: 30s, doubling,
/// capped at an hour.
pub fn retry_delay(attempts: i64) -> Duration {
    let doublings = attempts.saturating_sub(1).clamp(0, 7) as u32;
    Duration::seconds((30 * 2i64.pow(doublings)).min(3600))
}
