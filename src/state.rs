use std::sync::Arc;
use crate::domain::ports::{
    EmailService, EventRepository, JobRepository, NotificationDispatcher, RateLimitRepository, TicketRepository,
};
use crate::domain::services::{
    admission::AdmissionService, lifecycle::TicketLifecycleService, rate_limiter::RateLimiter,
};
use crate::config::Config;
use tera::Tera;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub event_repo: Arc<dyn EventRepository>,
    pub ticket_repo: Arc<dyn TicketRepository>,
    pub job_repo: Arc<dyn JobRepository>,
    pub rate_limit_repo: Arc<dyn RateLimitRepository>,
    pub email_service: Arc<dyn EmailService>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub admission_service: Arc<AdmissionService>,
    pub lifecycle_service: Arc<TicketLifecycleService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub templates: Arc<Tera>,
}
