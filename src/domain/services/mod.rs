pub mod admission;
pub mod calendar;
pub mod event_snapshot;
pub mod lifecycle;
pub mod notification;
pub mod rate_limiter;
pub mod ticket_code;
