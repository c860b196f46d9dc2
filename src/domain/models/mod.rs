pub mod event;
pub mod job;
pub mod rate_limit;
pub mod ticket;
