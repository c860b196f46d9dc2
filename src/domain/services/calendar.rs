use crate::domain::models::{event::Event, ticket::Ticket};
use icalendar::{Calendar, Component, Event as IcalEvent, EventLike};

/// Generates an iCalendar (.ics) invite for a ticket holder.
pub fn generate_ics(event: &Event, ticket: &Ticket) -> String {
    let mut calendar = Calendar::new();

    let ical_event = IcalEvent::new()
        .summary(&event.title)
        .description(&format!("Ticket {}\n{}", ticket.ticket_code, ticket.qr_url))
        .location(&event.location)
        .starts(event.starts_at)
        .ends(event.ends_at)
        .uid(&ticket.id)
        .done();

    calendar.push(ical_event);
    calendar.to_string()
}
