use axum::{extract::{Query, State}, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::dtos::requests::QrLookupQuery;
use crate::api::dtos::responses::TicketConfirmationView;
use crate::domain::services::ticket_code::is_well_formed_code;
use crate::error::AppError;
use std::sync::Arc;

/// Public code lookup behind the QR URL. Malformed, unknown and deleted
/// codes are all plain 404s.
pub async fn lookup_ticket(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QrLookupQuery>,
) -> Result<impl IntoResponse, AppError> {
    let code = query.code.as_deref().map(str::trim).unwrap_or_default().to_uppercase();
    if !is_well_formed_code(&code) {
        return Err(AppError::NotFound("Ticket not found".into()));
    }

    let ticket = state.ticket_repo.find_by_code(&code).await?
        .ok_or(AppError::NotFound("Ticket not found".into()))?;
    let event = state.event_repo.find_by_id(&ticket.event_id).await?
        .ok_or(AppError::NotFound("Ticket not found".into()))?;

    Ok(Json(TicketConfirmationView::new(ticket, &event)))
}
