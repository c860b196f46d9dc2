use std::sync::Arc;

use crate::domain::models::event::Event;
use crate::domain::ports::EventRepository;
use crate::error::AppError;

/// Read-only view of an event's admission policy. Missing, unpublished and
/// soft-deleted events all look the same to callers.
pub struct EventCapacitySnapshot {
    event_repo: Arc<dyn EventRepository>,
}

impl EventCapacitySnapshot {
    pub fn new(event_repo: Arc<dyn EventRepository>) -> Self {
        Self { event_repo }
    }

    pub async fn load(&self, event_id: &str) -> Result<Event, AppError> {
        self.event_repo
            .find_published(event_id)
            .await?
            .filter(Event::is_admissible)
            .ok_or_else(|| AppError::NotFound("Event not found".into()))
    }
}
