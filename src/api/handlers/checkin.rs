use axum::{extract::State, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::auth::AuthUser;
use crate::api::dtos::requests::CheckInRequest;
use crate::api::dtos::responses::CheckInResponse;
use crate::domain::services::ticket_code::is_well_formed_code;
use crate::error::AppError;
use std::sync::Arc;

pub async fn check_in(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CheckInRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_scanner()?;

    let code = payload.code.trim().to_uppercase();
    if !is_well_formed_code(&code) {
        return Err(AppError::NotFound("Ticket not found".into()));
    }

    let result = state.lifecycle_service.check_in(&code).await?;
    Ok(Json(CheckInResponse { ticket: result.ticket, already_checked_in: result.already_checked_in }))
}
