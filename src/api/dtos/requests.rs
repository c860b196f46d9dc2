use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::models::ticket::{normalize_email, CheckinStatus, Registrant, TicketFilter, TicketStatus};
use crate::domain::services::lifecycle::TicketPatch;
use crate::error::AppError;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 254;
const MAX_TEXT_LEN: usize = 500;

/// Public registration body, shared by the JSON and form-encoded variants.
/// Everything is optional here so that validation can report the exact
/// field that is missing.
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationRequest {
    pub event_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub whatsapp: Option<String>,
    pub school_or_campus: Option<String>,
    pub class_or_semester: Option<String>,
    pub domicile: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    /// Honeypot. Humans never see the input, so any value means a bot.
    pub website: Option<String>,
}

impl RegistrationRequest {
    pub fn is_bot(&self) -> bool {
        self.website.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    /// Email as used for rate limiting, if the caller sent something usable.
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_deref().map(normalize_email).filter(|e| !e.is_empty())
    }

    pub fn validate(self) -> Result<(String, Registrant), AppError> {
        let event_id = required(self.event_id, "event_id", "event_id is required")?;
        let full_name = required(self.full_name, "full_name", "full_name is required")?;
        if full_name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::InvalidField { field: "full_name", message: "full_name is too long".into() });
        }

        let email = normalize_email(&required(self.email, "email", "email is required")?);
        if email.len() > MAX_EMAIL_LEN || !is_plausible_email(&email) {
            return Err(AppError::InvalidField { field: "email", message: "email is not a valid address".into() });
        }

        Ok((event_id, Registrant {
            full_name,
            email,
            whatsapp: optional(self.whatsapp, "whatsapp")?,
            school_or_campus: optional(self.school_or_campus, "school_or_campus")?,
            class_or_semester: optional(self.class_or_semester, "class_or_semester")?,
            domicile: optional(self.domicile, "domicile")?,
            payment_method: optional(self.payment_method, "payment_method")?,
            payment_reference: optional(self.payment_reference, "payment_reference")?,
        }))
    }
}

fn required(value: Option<String>, field: &'static str, message: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidField { field, message: message.to_string() })
}

fn optional(value: Option<String>, field: &'static str) -> Result<Option<String>, AppError> {
    let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if value.as_ref().is_some_and(|v| v.chars().count() > MAX_TEXT_LEN) {
        return Err(AppError::InvalidField { field, message: format!("{field} is too long") });
    }
    Ok(value)
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTicketsQuery {
    pub page: Option<i64>,
    #[serde(rename = "perPage")]
    pub per_page: Option<i64>,
    pub event_id: Option<String>,
    pub status: Option<String>,
    pub checkin_status: Option<String>,
    pub q: Option<String>,
    pub locale: Option<String>,
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl ListTicketsQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page.unwrap_or(1).max(1),
            per_page: self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn to_filter(&self) -> Result<TicketFilter, AppError> {
        let pagination = self.pagination();
        let status = parse_enum::<TicketStatus>(self.status.as_deref(), "status")?;
        let checkin_status = parse_enum::<CheckinStatus>(self.checkin_status.as_deref(), "checkin_status")?;

        Ok(TicketFilter {
            event_id: non_blank(self.event_id.as_deref()),
            status,
            checkin_status,
            search: non_blank(self.q.as_deref()),
            limit: pagination.per_page,
            offset: (pagination.page - 1) * pagination.per_page,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn parse_enum<T: std::str::FromStr>(value: Option<&str>, field: &'static str) -> Result<Option<T>, AppError> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => raw
            .to_uppercase()
            .parse()
            .map(Some)
            .map_err(|_| AppError::InvalidField { field, message: format!("unknown {field} {raw}") }),
    }
}

/// `?id=` addressing used by the admin PATCH and DELETE routes.
#[derive(Debug, Default, Deserialize)]
pub struct TicketIdQuery {
    pub id: Option<String>,
    pub action: Option<String>,
}

impl TicketIdQuery {
    pub fn require_id(&self) -> Result<&str, AppError> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::InvalidField { field: "id", message: "id is required".into() })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTicketRequest {
    pub status: Option<String>,
    pub checkin_status: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub total_price: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub action: Option<String>,
}

impl UpdateTicketRequest {
    /// Splits the body into the field patch and the resend flag. The action
    /// may come from the body or from the query string.
    pub fn into_patch(self, query_action: Option<&str>) -> Result<(TicketPatch, bool), AppError> {
        let resend = match non_blank(self.action.as_deref().or(query_action)).as_deref() {
            None => false,
            Some("resend") => true,
            Some(other) => {
                return Err(AppError::InvalidField { field: "action", message: format!("unknown action {other}") });
            }
        };

        let patch = TicketPatch {
            status: parse_enum(self.status.as_deref(), "status")?,
            checkin_status: parse_enum(self.checkin_status.as_deref(), "checkin_status")?,
            payment_method: self.payment_method.map(|v| v.trim().to_string()),
            payment_reference: self.payment_reference.map(|v| v.trim().to_string()),
            total_price: self.total_price,
            paid_at: self.paid_at,
            expires_at: self.expires_at,
        };

        Ok((patch, resend))
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct QrLookupQuery {
    pub code: Option<String>,
}
