use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::TicketStatus;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingType {
    Free,
    Paid,
}

impl PricingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingType::Free => "FREE",
            PricingType::Paid => "PAID",
        }
    }

    /// Statuses that occupy a seat. Free events only count settled tickets,
    /// paid events also hold a seat for tickets awaiting payment.
    pub fn capacity_counted_statuses(&self) -> &'static [TicketStatus] {
        match self {
            PricingType::Free => &[TicketStatus::Confirmed],
            PricingType::Paid => &[TicketStatus::Pending, TicketStatus::Confirmed],
        }
    }

    pub fn initial_status(&self) -> TicketStatus {
        match self {
            PricingType::Free => TicketStatus::Confirmed,
            PricingType::Paid => TicketStatus::Pending,
        }
    }
}

impl FromStr for PricingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(PricingType::Free),
            "PAID" => Ok(PricingType::Paid),
            other => Err(format!("unknown pricing type {other}")),
        }
    }
}

impl TryFrom<String> for PricingType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for PricingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read model of an event. Events are authored elsewhere; the admission
/// engine only reads them (tests and seed scripts use `create`).
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub title_translations: Json<HashMap<String, String>>,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i64>,
    #[sqlx(try_from = "String")]
    pub pricing_type: PricingType,
    pub ticket_price: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub struct NewEventParams {
    pub title: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i64>,
    pub pricing_type: PricingType,
    pub ticket_price: i64,
    pub is_published: bool,
}

impl Event {
    pub fn new(params: NewEventParams) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: params.title,
            title_translations: Json(HashMap::new()),
            location: params.location,
            starts_at: params.starts_at,
            ends_at: params.ends_at,
            capacity: params.capacity,
            pricing_type: params.pricing_type,
            ticket_price: params.ticket_price,
            is_published: params.is_published,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_admissible(&self) -> bool {
        self.is_published && self.deleted_at.is_none()
    }

    /// Requested locale first, then the fallback locale, then the default title.
    pub fn localized_title(&self, locale: Option<&str>, fallback: Option<&str>) -> &str {
        [locale, fallback]
            .into_iter()
            .flatten()
            .find_map(|code| self.title_translations.get(code).filter(|t| !t.trim().is_empty()))
            .map(String::as_str)
            .unwrap_or(self.title.as_str())
    }
}
