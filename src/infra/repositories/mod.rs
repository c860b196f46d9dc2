pub mod sqlite_event_repo;
pub mod sqlite_ticket_repo;
pub mod sqlite_job_repo;
pub mod sqlite_rate_limit_repo;

pub mod postgres_event_repo;
pub mod postgres_ticket_repo;
pub mod postgres_job_repo;
pub mod postgres_rate_limit_repo;

pub(crate) const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// Case-insensitive substring pattern for LIKE with the wildcards in
/// `search` matched literally. Pair with [`LIKE_ESCAPE`].
pub(crate) fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Which unique index an insert tripped over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UniqueViolation {
    TicketCode,
    ActiveRegistration,
    Other,
}

/// Classifies unique violations for both backends. Postgres reports the
/// constraint name, SQLite only the offending columns in the message.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<UniqueViolation> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }

    let constraint = db_err.constraint().unwrap_or_default();
    let message = db_err.message();

    if constraint.contains("ticket_code") || message.contains("tickets.ticket_code") {
        Some(UniqueViolation::TicketCode)
    } else if constraint.contains("active_registration") || message.contains("tickets.event_id, tickets.email") {
        Some(UniqueViolation::ActiveRegistration)
    } else {
        Some(UniqueViolation::Other)
    }
}
