use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::Confirmed => "CONFIRMED",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, TicketStatus::Cancelled)
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TicketStatus::Pending),
            "CONFIRMED" => Ok(TicketStatus::Confirmed),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            other => Err(format!("unknown ticket status {other}")),
        }
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckinStatus {
    NotCheckedIn,
    CheckedIn,
}

impl CheckinStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinStatus::NotCheckedIn => "NOT_CHECKED_IN",
            CheckinStatus::CheckedIn => "CHECKED_IN",
        }
    }
}

impl FromStr for CheckinStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_CHECKED_IN" => Ok(CheckinStatus::NotCheckedIn),
            "CHECKED_IN" => Ok(CheckinStatus::CheckedIn),
            other => Err(format!("unknown check-in status {other}")),
        }
    }
}

impl TryFrom<String> for CheckinStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CheckinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registrant details captured at the boundary. Only name and email are
/// required; the rest is free-form.
#[derive(Debug, Clone, Default)]
pub struct Registrant {
    pub full_name: String,
    pub email: String,
    pub whatsapp: Option<String>,
    pub school_or_campus: Option<String>,
    pub class_or_semester: Option<String>,
    pub domicile: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Ticket {
    pub id: String,
    pub event_id: String,
    pub full_name: String,
    pub email: String,
    pub whatsapp: Option<String>,
    pub school_or_campus: Option<String>,
    pub class_or_semester: Option<String>,
    pub domicile: Option<String>,
    pub ticket_code: String,
    pub qr_url: String,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    #[sqlx(try_from = "String")]
    pub checkin_status: CheckinStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub total_price: i64,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub struct NewTicketParams {
    pub event_id: String,
    pub registrant: Registrant,
    pub ticket_code: String,
    pub qr_url: String,
    pub status: TicketStatus,
    pub total_price: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

impl Ticket {
    pub fn new(params: NewTicketParams) -> Self {
        let registrant = params.registrant;
        Self {
            id: Uuid::new_v4().to_string(),
            event_id: params.event_id,
            full_name: registrant.full_name,
            email: normalize_email(&registrant.email),
            whatsapp: registrant.whatsapp,
            school_or_campus: registrant.school_or_campus,
            class_or_semester: registrant.class_or_semester,
            domicile: registrant.domicile,
            ticket_code: params.ticket_code,
            qr_url: params.qr_url,
            status: params.status,
            checkin_status: CheckinStatus::NotCheckedIn,
            checked_in_at: None,
            total_price: params.total_price,
            payment_method: registrant.payment_method,
            payment_reference: registrant.payment_reference,
            paid_at: params.paid_at,
            expires_at: params.expires_at,
            created_at: params.now,
            updated_at: params.now,
            deleted_at: None,
        }
    }

    pub fn is_checked_in(&self) -> bool {
        self.checkin_status == CheckinStatus::CheckedIn
    }
}

/// Admin listing filter. Soft-deleted tickets are never listed.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub event_id: Option<String>,
    pub status: Option<TicketStatus>,
    pub checkin_status: Option<CheckinStatus>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Result of the atomic check-and-insert performed by the ticket store.
#[derive(Debug)]
pub enum AdmissionOutcome {
    Admitted(Ticket),
    Duplicate,
    SoldOut,
    EventUnavailable,
    CodeCollision,
}
