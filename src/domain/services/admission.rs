use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::domain::models::event::{Event, PricingType};
use crate::domain::models::ticket::{AdmissionOutcome, NewTicketParams, Registrant, Ticket, TicketStatus};
use crate::domain::ports::{NotificationDispatcher, NotificationKind, TicketCodeGenerator, TicketRepository};
use crate::domain::services::event_snapshot::EventCapacitySnapshot;
use crate::domain::services::ticket_code::qr_url_for;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    pub public_base_url: String,
    pub max_code_attempts: u32,
    pub pending_hold: Option<Duration>,
}

/// Initial lifecycle values for a ticket, fixed by the event's pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionTerms {
    pub status: TicketStatus,
    pub total_price: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AdmissionTerms {
    pub fn for_event(event: &Event, now: DateTime<Utc>, pending_hold: Option<Duration>) -> Self {
        let status = event.pricing_type.initial_status();
        match event.pricing_type {
            PricingType::Free => Self {
                status,
                total_price: 0,
                paid_at: Some(now),
                expires_at: None,
            },
            PricingType::Paid => Self {
                status,
                total_price: event.ticket_price,
                paid_at: None,
                expires_at: pending_hold.map(|hold| now + hold),
            },
        }
    }
}

pub struct AdmissionService {
    snapshot: EventCapacitySnapshot,
    ticket_repo: Arc<dyn TicketRepository>,
    code_generator: Arc<dyn TicketCodeGenerator>,
    notifier: Arc<dyn NotificationDispatcher>,
    settings: AdmissionSettings,
}

impl AdmissionService {
    pub fn new(
        snapshot: EventCapacitySnapshot,
        ticket_repo: Arc<dyn TicketRepository>,
        code_generator: Arc<dyn TicketCodeGenerator>,
        notifier: Arc<dyn NotificationDispatcher>,
        settings: AdmissionSettings,
    ) -> Self {
        Self { snapshot, ticket_repo, code_generator, notifier, settings }
    }

    pub async fn admit(&self, event_id: &str, registrant: Registrant) -> Result<Ticket, AppError> {
        let event = self.snapshot.load(event_id).await?;
        let now = Utc::now();
        let terms = AdmissionTerms::for_event(&event, now, self.settings.pending_hold);
        let attempts = self.settings.max_code_attempts.max(1);

        for attempt in 1..=attempts {
            let ticket_code = self.code_generator.generate();
            let draft = Ticket::new(NewTicketParams {
                event_id: event.id.clone(),
                registrant: registrant.clone(),
                qr_url: qr_url_for(&self.settings.public_base_url, &ticket_code),
                ticket_code,
                status: terms.status,
                total_price: terms.total_price,
                paid_at: terms.paid_at,
                expires_at: terms.expires_at,
                now,
            });

            match self.ticket_repo.admit(&draft, event.pricing_type).await? {
                AdmissionOutcome::Admitted(ticket) => {
                    info!(ticket_id = %ticket.id, event_id = %event.id, status = %ticket.status, "admission granted");
                    self.schedule_confirmation(&ticket).await;
                    return Ok(ticket);
                }
                AdmissionOutcome::Duplicate => {
                    info!(event_id = %event.id, "admission rejected: duplicate registration");
                    return Err(AppError::Duplicate(
                        "This email is already registered for the event. Check your inbox for the ticket or contact the organizer.".into(),
                    ));
                }
                AdmissionOutcome::SoldOut => {
                    info!(event_id = %event.id, capacity = ?event.capacity, "admission rejected: sold out");
                    return Err(AppError::SoldOut);
                }
                AdmissionOutcome::EventUnavailable => {
                    return Err(AppError::NotFound("Event not found".into()));
                }
                AdmissionOutcome::CodeCollision => {
                    warn!(attempt, event_id = %event.id, "ticket code collision, regenerating");
                }
            }
        }

        error!(attempts, event_id = %event.id, "ticket code generation exhausted its retry budget");
        Err(AppError::CodeGeneration { attempts })
    }

    async fn schedule_confirmation(&self, ticket: &Ticket) {
        if let Err(e) = self.notifier.schedule(ticket, NotificationKind::Confirmation).await {
            error!(ticket_id = %ticket.id, "failed to schedule confirmation: {}", e);
        }
    }
}
