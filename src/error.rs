use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::domain::models::rate_limit::RateLimitDecision;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Invalid field {field}: {message}")]
    InvalidField { field: &'static str, message: String },
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Duplicate registration: {0}")]
    Duplicate(String),
    #[error("Event is sold out")]
    SoldOut,
    #[error("Rate limited on {} scope", .0.scope.as_str())]
    RateLimited(RateLimitDecision),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Ticket code generation failed after {attempts} attempts")]
    CodeGeneration { attempts: u32 },
    #[error("Notification failed: {0}")]
    Notification(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal,
    #[error("Internal server error: {0}")]
    InternalWithMsg(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Validation(_) | AppError::InvalidField { .. } => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Duplicate(_) => "DUPLICATE_REGISTRATION",
            AppError::SoldOut => "SOLD_OUT",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::CodeGeneration { .. } => "GENERATION_COLLISION",
            AppError::Notification(_) => "NOTIFICATION_FAILED",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal | AppError::InternalWithMsg(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let mut headers = HeaderMap::new();
        let mut field = None;

        let (status, message) = match &self {
            AppError::Database(e) => {
                if let Some(db_err) = e.as_database_error()
                    && db_err.is_unique_violation() {
                    return (
                        StatusCode::CONFLICT,
                        Json(json!({ "error": "Resource already exists (duplicate entry)", "code": "CONFLICT" }))
                    ).into_response();
                }

                error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidField { field: name, message } => {
                field = Some(*name);
                (StatusCode::BAD_REQUEST, message.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Duplicate(msg) => (StatusCode::CONFLICT, msg.clone()),
            // Kept at 400 so existing registration clients keep working.
            AppError::SoldOut => (StatusCode::BAD_REQUEST, "Event is sold out".to_string()),
            AppError::RateLimited(decision) => {
                decision.write_headers(&mut headers);
                headers.insert(axum::http::header::RETRY_AFTER, decision.retry_after_secs().into());
                (StatusCode::TOO_MANY_REQUESTS, "Too many registration attempts, please retry later".to_string())
            }
            AppError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::CodeGeneration { attempts } => {
                error!(attempts = *attempts, "Ticket code space exhausted its retry budget; review code length/alphabet");
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not issue ticket, please retry".to_string())
            }
            AppError::Notification(msg) | AppError::Config(msg) | AppError::InternalWithMsg(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
        };

        let body = match field {
            Some(field) => json!({ "error": message, "code": code, "field": field }),
            None => json!({ "error": message, "code": code }),
        };

        (status, headers, Json(body)).into_response()
    }
}
