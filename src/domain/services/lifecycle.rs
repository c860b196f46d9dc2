use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::domain::models::ticket::{CheckinStatus, Ticket, TicketStatus};
use crate::domain::ports::{JobRepository, NotificationDispatcher, NotificationKind, TicketRepository};
use crate::error::AppError;

/// Partial administrative update. `None` leaves a field untouched; an empty
/// string clears the payment text fields.
#[derive(Debug, Clone, Default)]
pub struct TicketPatch {
    pub status: Option<TicketStatus>,
    pub checkin_status: Option<CheckinStatus>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub total_price: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct CheckInResult {
    pub ticket: Ticket,
    pub already_checked_in: bool,
}

pub fn ensure_status_transition(from: TicketStatus, to: TicketStatus) -> Result<(), AppError> {
    use TicketStatus::*;
    match (from, to) {
        (a, b) if a == b => Ok(()),
        (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) => Ok(()),
        _ => Err(AppError::InvalidTransition(format!("Cannot change ticket status from {from} to {to}"))),
    }
}

/// Check-in is only legal for confirmed tickets, including repeat scans of a
/// ticket cancelled after entry. Returns `false` when the ticket is already
/// checked in, which callers treat as success.
pub fn ensure_can_check_in(ticket: &Ticket) -> Result<bool, AppError> {
    if ticket.status != TicketStatus::Confirmed {
        return Err(AppError::InvalidTransition(format!(
            "Ticket is {} and cannot be checked in",
            ticket.status
        )));
    }
    Ok(!ticket.is_checked_in())
}

/// Applies `patch` to `ticket` in place. Status moves first so that a patch
/// confirming and checking in a ticket at once is accepted.
pub fn apply_patch(ticket: &mut Ticket, patch: TicketPatch, now: DateTime<Utc>) -> Result<(), AppError> {
    if let Some(total_price) = patch.total_price {
        if total_price < 0 {
            return Err(AppError::InvalidField { field: "total_price", message: "total_price must not be negative".into() });
        }
        ticket.total_price = total_price;
    }

    if let Some(status) = patch.status {
        ensure_status_transition(ticket.status, status)?;
        if ticket.status == TicketStatus::Pending && status == TicketStatus::Confirmed && ticket.paid_at.is_none() {
            ticket.paid_at = Some(now);
        }
        ticket.status = status;
    }

    match patch.checkin_status {
        Some(CheckinStatus::CheckedIn) => {
            if ensure_can_check_in(ticket)? {
                ticket.checkin_status = CheckinStatus::CheckedIn;
                ticket.checked_in_at = Some(now);
            }
        }
        Some(CheckinStatus::NotCheckedIn) if ticket.is_checked_in() => {
            return Err(AppError::InvalidTransition("A checked-in ticket cannot be reverted".into()));
        }
        _ => {}
    }

    if let Some(method) = patch.payment_method {
        ticket.payment_method = if method.trim().is_empty() { None } else { Some(method) };
    }
    if let Some(reference) = patch.payment_reference {
        ticket.payment_reference = if reference.trim().is_empty() { None } else { Some(reference) };
    }
    if let Some(paid_at) = patch.paid_at {
        ticket.paid_at = Some(paid_at);
    }
    if let Some(expires_at) = patch.expires_at {
        ticket.expires_at = Some(expires_at);
    }

    ticket.updated_at = now;
    Ok(())
}

pub struct TicketLifecycleService {
    ticket_repo: Arc<dyn TicketRepository>,
    job_repo: Arc<dyn JobRepository>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl TicketLifecycleService {
    pub fn new(
        ticket_repo: Arc<dyn TicketRepository>,
        job_repo: Arc<dyn JobRepository>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self { ticket_repo, job_repo, notifier }
    }

    pub async fn get(&self, id: &str) -> Result<Ticket, AppError> {
        self.ticket_repo.find_by_id(id).await?
            .ok_or(AppError::NotFound("Ticket not found".into()))
    }

    pub async fn update(&self, id: &str, patch: TicketPatch, resend: bool) -> Result<Ticket, AppError> {
        let read = self.get(id).await?;
        let previous_status = read.status;

        let mut ticket = read.clone();
        apply_patch(&mut ticket, patch, Utc::now())?;

        // A scan landing between the read and the write makes this miss
        // instead of reverting the check-in.
        let updated = self.ticket_repo.update(&ticket, &read).await?
            .ok_or(AppError::Conflict("Ticket was modified concurrently, please retry".into()))?;

        if previous_status != updated.status {
            info!(ticket_id = %updated.id, from = %previous_status, to = %updated.status, "ticket status changed");
        }
        if previous_status != TicketStatus::Cancelled && updated.status == TicketStatus::Cancelled {
            self.cancel_pending_notifications(&updated.id).await;
        }
        if resend {
            self.resend(&updated).await;
        }

        Ok(updated)
    }

    /// Re-triggers the confirmation message from the ticket's current state.
    pub async fn resend(&self, ticket: &Ticket) {
        match self.notifier.schedule(ticket, NotificationKind::Resend).await {
            Ok(()) => info!(ticket_id = %ticket.id, "ticket notification resend scheduled"),
            Err(e) => error!(ticket_id = %ticket.id, "failed to schedule ticket resend: {}", e),
        }
    }

    pub async fn check_in(&self, code: &str) -> Result<CheckInResult, AppError> {
        let ticket = self.ticket_repo.find_by_code(code).await?
            .ok_or(AppError::NotFound("Ticket not found".into()))?;

        if !ensure_can_check_in(&ticket)? {
            info!(ticket_id = %ticket.id, "repeat check-in scan");
            return Ok(CheckInResult { ticket, already_checked_in: true });
        }

        if let Some(checked_in) = self.ticket_repo.mark_checked_in(&ticket.id, Utc::now()).await? {
            info!(ticket_id = %checked_in.id, "ticket checked in");
            return Ok(CheckInResult { ticket: checked_in, already_checked_in: false });
        }

        // The guarded update lost a race; report whatever state won.
        let current = self.get(&ticket.id).await?;
        if ensure_can_check_in(&current)? {
            return Err(AppError::Conflict("Check-in could not be recorded, please retry".into()));
        }
        Ok(CheckInResult { ticket: current, already_checked_in: true })
    }

    pub async fn soft_delete(&self, id: &str) -> Result<(), AppError> {
        self.ticket_repo.soft_delete(id, Utc::now()).await?;
        info!(ticket_id = %id, "ticket soft-deleted");
        self.cancel_pending_notifications(id).await;
        Ok(())
    }

    async fn cancel_pending_notifications(&self, ticket_id: &str) {
        match self.job_repo.cancel_pending_for_ticket(ticket_id, Utc::now()).await {
            Ok(0) => {}
            Ok(cancelled) => info!(ticket_id = %ticket_id, cancelled, "pending notifications cancelled"),
            Err(e) => error!(ticket_id = %ticket_id, "failed to cancel pending notifications: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ticket::{NewTicketParams, Registrant};

    fn ticket(status: TicketStatus) -> Ticket {
        Ticket::new(NewTicketParams {
            event_id: "event-1".into(),
            registrant: Registrant {
                full_name: "Dewi Lestari".into(),
                email: "Dewi@Example.com ".into(),
                ..Default::default()
            },
            ticket_code: "EVT-ABCDEF-2345".into(),
            qr_url: "http://localhost/api/v1/tickets/qr?code=EVT-ABCDEF-2345".into(),
            status,
            total_price: 150_000,
            paid_at: None,
            expires_at: None,
            now: Utc::now(),
        })
    }

    #[test]
    fn allowed_status_transitions() {
        use TicketStatus::*;
        assert!(ensure_status_transition(Pending, Confirmed).is_ok());
        assert!(ensure_status_transition(Pending, Cancelled).is_ok());
        assert!(ensure_status_transition(Confirmed, Cancelled).is_ok());
        assert!(ensure_status_transition(Confirmed, Confirmed).is_ok());
        assert!(ensure_status_transition(Cancelled, Cancelled).is_ok());
    }

    #[test]
    fn cancelled_is_terminal_and_confirmed_cannot_go_back() {
        use TicketStatus::*;
        for (from, to) in [(Cancelled, Pending), (Cancelled, Confirmed), (Confirmed, Pending)] {
            assert!(matches!(ensure_status_transition(from, to), Err(AppError::InvalidTransition(_))));
        }
    }

    #[test]
    fn check_in_requires_confirmed_and_is_idempotent() {
        let pending = ticket(TicketStatus::Pending);
        assert!(matches!(ensure_can_check_in(&pending), Err(AppError::InvalidTransition(_))));

        let mut confirmed = ticket(TicketStatus::Confirmed);
        assert!(ensure_can_check_in(&confirmed).unwrap());
        confirmed.checkin_status = CheckinStatus::CheckedIn;
        assert!(!ensure_can_check_in(&confirmed).unwrap());
    }

    #[test]
    fn cancelled_ticket_does_not_scan_even_after_entry() {
        let mut t = ticket(TicketStatus::Confirmed);
        t.checkin_status = CheckinStatus::CheckedIn;
        t.checked_in_at = Some(Utc::now());
        t.status = TicketStatus::Cancelled;
        assert!(matches!(ensure_can_check_in(&t), Err(AppError::InvalidTransition(_))));
    }

    #[test]
    fn confirming_sets_paid_at_and_leaves_other_fields() {
        let mut t = ticket(TicketStatus::Pending);
        t.payment_method = Some("transfer".into());
        let now = Utc::now();
        apply_patch(&mut t, TicketPatch { status: Some(TicketStatus::Confirmed), ..Default::default() }, now).unwrap();
        assert_eq!(t.status, TicketStatus::Confirmed);
        assert_eq!(t.paid_at, Some(now));
        assert_eq!(t.payment_method.as_deref(), Some("transfer"));
        assert_eq!(t.total_price, 150_000);
        assert_eq!(t.email, "dewi@example.com");
    }

    #[test]
    fn patch_can_confirm_and_check_in_together_but_not_cancel_and_check_in() {
        let mut t = ticket(TicketStatus::Pending);
        apply_patch(&mut t, TicketPatch {
            status: Some(TicketStatus::Confirmed),
            checkin_status: Some(CheckinStatus::CheckedIn),
            ..Default::default()
        }, Utc::now()).unwrap();
        assert!(t.is_checked_in());
        assert!(t.checked_in_at.is_some());

        let mut t = ticket(TicketStatus::Pending);
        let err = apply_patch(&mut t, TicketPatch {
            status: Some(TicketStatus::Cancelled),
            checkin_status: Some(CheckinStatus::CheckedIn),
            ..Default::default()
        }, Utc::now());
        assert!(matches!(err, Err(AppError::InvalidTransition(_))));
    }

    #[test]
    fn empty_strings_clear_payment_text_and_negative_price_is_rejected() {
        let mut t = ticket(TicketStatus::Pending);
        t.payment_reference = Some("INV-1".into());
        apply_patch(&mut t, TicketPatch { payment_reference: Some(String::new()), ..Default::default() }, Utc::now()).unwrap();
        assert_eq!(t.payment_reference, None);

        let err = apply_patch(&mut t, TicketPatch { total_price: Some(-1), ..Default::default() }, Utc::now());
        assert!(matches!(err, Err(AppError::InvalidField { field: "total_price", .. })));
    }

    #[test]
    fn checked_in_ticket_cannot_be_reverted() {
        let mut t = ticket(TicketStatus::Confirmed);
        t.checkin_status = CheckinStatus::CheckedIn;
        let err = apply_patch(&mut t, TicketPatch { checkin_status: Some(CheckinStatus::NotCheckedIn), ..Default::default() }, Utc::now());
        assert!(matches!(err, Err(AppError::InvalidTransition(_))));
    }
}
