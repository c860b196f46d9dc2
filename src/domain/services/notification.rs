use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tera::{Context, Tera};

use crate::domain::models::event::Event;
use crate::domain::models::job::{Job, JobKind};
use crate::domain::models::ticket::Ticket;
use crate::domain::ports::{JobRepository, NotificationDispatcher, NotificationKind};
use crate::error::AppError;

pub const CONFIRMATION_TEMPLATE: &str = "ticket_confirmation.html";
pub const CONFIRMATION_SUBJECT_TEMPLATE: &str = "ticket_confirmation_subject";

/// Hands ticket messages to the durable job queue; the background worker
/// does the actual delivery.
pub struct JobQueueNotifier {
    job_repo: Arc<dyn JobRepository>,
}

impl JobQueueNotifier {
    pub fn new(job_repo: Arc<dyn JobRepository>) -> Self {
        Self { job_repo }
    }
}

#[async_trait]
impl NotificationDispatcher for JobQueueNotifier {
    async fn schedule(&self, ticket: &Ticket, kind: NotificationKind) -> Result<(), AppError> {
        let job_kind = match kind {
            NotificationKind::Confirmation => JobKind::TicketConfirmation,
            NotificationKind::Resend => JobKind::TicketResend,
        };
        self.job_repo
            .enqueue(&Job::new(job_kind, &ticket.id, Utc::now()))
            .await
            .map_err(|e| AppError::Notification(format!("could not enqueue {job_kind}: {e}")))?;
        Ok(())
    }
}

pub struct RenderedMessage {
    pub subject: String,
    pub html_body: String,
}

pub fn render_ticket_message(templates: &Tera, ticket: &Ticket, event: &Event) -> Result<RenderedMessage, AppError> {
    let mut context = Context::new();
    context.insert("full_name", &ticket.full_name);
    context.insert("event_title", &event.title);
    context.insert("location", &event.location);
    context.insert("starts_at", &event.starts_at.format("%Y-%m-%d %H:%M UTC").to_string());
    context.insert("ends_at", &event.ends_at.format("%Y-%m-%d %H:%M UTC").to_string());
    context.insert("ticket_code", &ticket.ticket_code);
    context.insert("qr_url", &ticket.qr_url);
    context.insert("status", ticket.status.as_str());
    context.insert("total_price", &ticket.total_price);
    context.insert("is_paid_event", &(ticket.total_price > 0));

    let html_body = templates.render(CONFIRMATION_TEMPLATE, &context)
        .map_err(|e| AppError::Notification(format!("Tera render error: {:?}", e)))?;
    let subject = templates.render(CONFIRMATION_SUBJECT_TEMPLATE, &context)
        .map_err(|e| AppError::Notification(format!("Tera subject render error: {:?}", e)))?;

    Ok(RenderedMessage { subject: subject.trim().to_string(), html_body })
}

pub fn load_templates() -> Result<Tera, AppError> {
    let mut tera = Tera::default();
    tera.add_raw_template(CONFIRMATION_TEMPLATE, include_str!("../../templates/ticket_confirmation.html"))
        .map_err(|e| AppError::Config(format!("Failed to load confirmation template: {:?}", e)))?;
    tera.add_raw_template(CONFIRMATION_SUBJECT_TEMPLATE, "Your ticket {{ ticket_code }} for {{ event_title }}")
        .map_err(|e| AppError::Config(format!("Failed to load subject template: {:?}", e)))?;
    Ok(tera)
}
