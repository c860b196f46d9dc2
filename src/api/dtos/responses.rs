use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::models::event::Event;
use crate::domain::models::ticket::{CheckinStatus, Ticket, TicketStatus};

#[derive(Serialize)]
pub struct TicketListItem {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub event_title: Option<String>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ListMeta {
    pub page: i64,
    #[serde(rename = "perPage")]
    pub per_page: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl ListMeta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = if total == 0 { 0 } else { (total + per_page - 1) / per_page };
        Self { page, per_page, total, total_pages }
    }
}

#[derive(Serialize)]
pub struct TicketListResponse {
    pub data: Vec<TicketListItem>,
    pub meta: ListMeta,
}

#[derive(Serialize)]
pub struct CheckInResponse {
    pub ticket: Ticket,
    pub already_checked_in: bool,
}

/// What anyone holding a ticket code may see. No contact details.
#[derive(Serialize)]
pub struct TicketConfirmationView {
    pub ticket_code: String,
    pub full_name: String,
    pub status: TicketStatus,
    pub checkin_status: CheckinStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub event_title: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl TicketConfirmationView {
    pub fn new(ticket: Ticket, event: &Event) -> Self {
        Self {
            ticket_code: ticket.ticket_code,
            full_name: ticket.full_name,
            status: ticket.status,
            checkin_status: ticket.checkin_status,
            checked_in_at: ticket.checked_in_at,
            event_title: event.title.clone(),
            location: event.location.clone(),
            starts_at: event.starts_at,
            ends_at: event.ends_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(ListMeta::new(1, 20, 0).total_pages, 0);
        assert_eq!(ListMeta::new(1, 20, 20).total_pages, 1);
        assert_eq!(ListMeta::new(2, 20, 21).total_pages, 2);
    }
}
