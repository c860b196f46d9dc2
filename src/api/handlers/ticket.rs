use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use crate::state::AppState;
use crate::api::extractors::{auth::AuthUser, client_ip::ClientIp, registration::RegistrationForm};
use crate::api::dtos::requests::{ListTicketsQuery, TicketIdQuery, UpdateTicketRequest};
use crate::api::dtos::responses::{ListMeta, TicketListItem, TicketListResponse};
use crate::domain::models::event::Event;
use crate::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn register_ticket(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    RegistrationForm(payload): RegistrationForm,
) -> Result<Response, AppError> {
    if payload.is_bot() {
        warn!(client_ip = %client_ip, "honeypot field filled, discarding registration");
        return Ok((StatusCode::CREATED, Json(serde_json::json!({"status": "received"}))).into_response());
    }

    let decision = state.rate_limiter
        .check_registration(&client_ip, payload.normalized_email().as_deref())
        .await?;

    let (event_id, registrant) = payload.validate()?;
    info!(event_id = %event_id, "register_ticket: admission requested");
    let ticket = state.admission_service.admit(&event_id, registrant).await?;

    let mut headers = HeaderMap::new();
    decision.write_headers(&mut headers);
    Ok((StatusCode::CREATED, headers, Json(ticket)).into_response())
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListTicketsQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;

    let pagination = query.pagination();
    let filter = query.to_filter()?;
    let (tickets, total) = state.ticket_repo.list(&filter).await?;

    let mut events: HashMap<String, Option<Event>> = HashMap::new();
    let mut data = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        if !events.contains_key(&ticket.event_id) {
            let event = state.event_repo.find_by_id(&ticket.event_id).await?;
            events.insert(ticket.event_id.clone(), event);
        }
        let event_title = events.get(&ticket.event_id)
            .and_then(Option::as_ref)
            .map(|event| event.localized_title(query.locale.as_deref(), query.fallback.as_deref()).to_string());
        data.push(TicketListItem { ticket, event_title });
    }

    Ok(Json(TicketListResponse {
        data,
        meta: ListMeta::new(pagination.page, pagination.per_page, total),
    }))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(ticket_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let ticket = state.lifecycle_service.get(&ticket_id).await?;
    Ok(Json(ticket))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<TicketIdQuery>,
    Json(payload): Json<UpdateTicketRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let ticket_id = query.require_id()?;
    let (patch, resend) = payload.into_patch(query.action.as_deref())?;

    let updated = state.lifecycle_service.update(ticket_id, patch, resend).await?;
    info!(ticket_id = %updated.id, admin = %user.0.sub, "ticket updated");
    Ok(Json(updated))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<TicketIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let ticket_id = query.require_id()?;
    state.lifecycle_service.soft_delete(ticket_id).await?;
    Ok(Json(serde_json::json!({"status": "deleted"})))
}
