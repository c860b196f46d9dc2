mod common;

use admission_backend::domain::models::event::PricingType;
use admission_backend::domain::models::ticket::CheckinStatus;
use admission_backend::domain::services::lifecycle::{apply_patch, TicketPatch};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Utc;
use common::{mint_token, parse_body, TestApp};
use serde_json::json;
use tokio::task::JoinSet;
use tower::ServiceExt;

async fn check_in(app: &TestApp, role: &str, code: &str) -> axum::response::Response {
    app.as_role(role, "POST", "/api/v1/tickets/checkin", Some(json!({"code": code}))).await
}

#[tokio::test]
async fn test_confirmed_ticket_checks_in_once() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, None, 0).await;
    let ticket = app.register_ok(&event.id, "door@example.com").await;
    let code = ticket["ticket_code"].as_str().unwrap();

    let response = check_in(&app, "scanner", code).await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = parse_body(response).await;
    assert_eq!(first["already_checked_in"], false);
    assert_eq!(first["ticket"]["checkin_status"], "CHECKED_IN");
    assert!(first["ticket"]["checked_in_at"].is_string());

    let response = check_in(&app, "admin", code).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = parse_body(response).await;
    assert_eq!(second["already_checked_in"], true);
    assert_eq!(second["ticket"]["checked_in_at"], first["ticket"]["checked_in_at"]);
}

#[tokio::test]
async fn test_scanned_code_is_case_insensitive() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, None, 0).await;
    let ticket = app.register_ok(&event.id, "lower@example.com").await;
    let code = ticket["ticket_code"].as_str().unwrap().to_lowercase();

    let response = check_in(&app, "scanner", &format!("  {code} ")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unpaid_and_cancelled_tickets_are_refused() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Paid, None, 30_000).await;
    let pending = app.register_ok(&event.id, "unpaid@example.com").await;

    let response = check_in(&app, "scanner", pending["ticket_code"].as_str().unwrap()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(parse_body(response).await["code"], "INVALID_TRANSITION");

    let cancelled = app.register_ok(&event.id, "cancelled@example.com").await;
    let response = app.admin(
        "PATCH",
        &format!("/api/v1/tickets?id={}", cancelled["id"].as_str().unwrap()),
        Some(json!({"status": "CANCELLED"})),
    ).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = check_in(&app, "scanner", cancelled["ticket_code"].as_str().unwrap()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_ticket_cancelled_after_entry_no_longer_scans() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, None, 0).await;
    let ticket = app.register_ok(&event.id, "leaver@example.com").await;
    let code = ticket["ticket_code"].as_str().unwrap();

    assert_eq!(check_in(&app, "scanner", code).await.status(), StatusCode::OK);

    let response = app.admin(
        "PATCH",
        &format!("/api/v1/tickets?id={}", ticket["id"].as_str().unwrap()),
        Some(json!({"status": "CANCELLED"})),
    ).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = check_in(&app, "scanner", code).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(parse_body(response).await["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_admin_patch_does_not_undo_a_concurrent_check_in() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, None, 0).await;
    let ticket = app.register_ok(&event.id, "overlap@example.com").await;
    let id = ticket["id"].as_str().unwrap();

    // The admin reads the ticket, then the door scans it before the write.
    let read = app.state.lifecycle_service.get(id).await.unwrap();
    let scanned = app.state.ticket_repo.mark_checked_in(id, Utc::now()).await.unwrap();
    assert!(scanned.is_some());

    let mut stale = read.clone();
    apply_patch(&mut stale, TicketPatch { payment_method: Some("cash".into()), ..Default::default() }, Utc::now()).unwrap();
    let written = app.state.ticket_repo.update(&stale, &read).await.unwrap();
    assert!(written.is_none());

    let stored = app.state.ticket_repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.checkin_status, CheckinStatus::CheckedIn);
    assert!(stored.checked_in_at.is_some());
    assert_eq!(stored.payment_method, None);

    // Retried against the fresh row, the patch lands and keeps the check-in.
    let response = app.admin("PATCH", &format!("/api/v1/tickets?id={id}"), Some(json!({"payment_method": "cash"}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = parse_body(response).await;
    assert_eq!(updated["payment_method"], "cash");
    assert_eq!(updated["checkin_status"], "CHECKED_IN");
    assert!(updated["checked_in_at"].is_string());
}

#[tokio::test]
async fn test_unknown_and_malformed_codes_are_not_found() {
    let app = TestApp::new().await;

    let response = check_in(&app, "scanner", "EVT-AAAAAA-2222").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = check_in(&app, "scanner", "DROP TABLE tickets").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_check_in_needs_a_staff_role() {
    let app = TestApp::new().await;

    let response = app.send(
        Request::builder()
            .method("POST")
            .uri("/api/v1/tickets/checkin")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"code": "EVT-AAAAAA-2222"}).to_string()))
            .unwrap()
    ).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = check_in(&app, "attendee", "EVT-AAAAAA-2222").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_simultaneous_scans_record_one_check_in() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, None, 0).await;
    let ticket = app.register_ok(&event.id, "rush@example.com").await;
    let code = ticket["ticket_code"].as_str().unwrap().to_string();
    let token = mint_token("scanner", "csrf");

    let mut set = JoinSet::new();
    for _ in 0..6 {
        let router = app.router.clone();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/tickets/checkin")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"code": code}).to_string()))
            .unwrap();
        set.spawn(async move { parse_body(router.oneshot(request).await.unwrap()).await });
    }

    let mut fresh = 0;
    while let Some(body) = set.join_next().await {
        let body = body.unwrap();
        assert_eq!(body["ticket"]["checkin_status"], "CHECKED_IN");
        if body["already_checked_in"] == false {
            fresh += 1;
        }
    }
    assert_eq!(fresh, 1);
}

#[tokio::test]
async fn test_qr_lookup_shows_ticket_without_contact_details() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, None, 0).await;
    let ticket = app.register_ok(&event.id, "qr@example.com").await;
    let code = ticket["ticket_code"].as_str().unwrap();

    let response = app.send(
        Request::builder().uri(format!("/api/v1/tickets/qr?code={code}")).body(Body::empty()).unwrap()
    ).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = parse_body(response).await;
    assert_eq!(view["ticket_code"], code);
    assert_eq!(view["event_title"], "Seminar Karier");
    assert_eq!(view["status"], "CONFIRMED");
    assert!(view.get("email").is_none());
    assert!(view.get("whatsapp").is_none());
}

#[tokio::test]
async fn test_qr_lookup_hides_deleted_and_malformed_codes() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, None, 0).await;
    let ticket = app.register_ok(&event.id, "gone@example.com").await;
    let code = ticket["ticket_code"].as_str().unwrap();

    app.admin("DELETE", &format!("/api/v1/tickets?id={}", ticket["id"].as_str().unwrap()), None).await;

    for uri in [
        format!("/api/v1/tickets/qr?code={code}"),
        "/api/v1/tickets/qr?code=nope".to_string(),
        "/api/v1/tickets/qr".to_string(),
    ] {
        let response = app.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
