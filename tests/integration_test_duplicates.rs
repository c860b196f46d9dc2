mod common;

use admission_backend::domain::models::event::PricingType;
use axum::http::StatusCode;
use common::{parse_body, registration, TestApp};
use serde_json::json;
use tokio::task::JoinSet;
use tower::ServiceExt;

#[tokio::test]
async fn test_second_registration_with_same_email_conflicts() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, Some(10), 0).await;
    app.register_ok(&event.id, "dup@example.com").await;

    let response = app.register(registration(&event.id, "dup@example.com"), "203.0.113.20").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = parse_body(response).await;
    assert_eq!(body["code"], "DUPLICATE_REGISTRATION");
    assert!(body["error"].as_str().unwrap().contains("already registered"));
}

#[tokio::test]
async fn test_duplicate_check_ignores_email_case_and_whitespace() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Paid, None, 10_000).await;
    app.register_ok(&event.id, "Mixed.Case@Example.com").await;

    let response = app.register(registration(&event.id, "  mixed.case@EXAMPLE.COM"), "203.0.113.20").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_concurrent_duplicates_admit_once() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, None, 0).await;

    let mut set = JoinSet::new();
    for i in 0..8 {
        let router = app.router.clone();
        let body = registration(&event.id, "twin@example.com");
        set.spawn(async move {
            let request = axum::http::Request::builder()
                .method("POST")
                .uri("/api/v1/tickets")
                .header("content-type", "application/json")
                .header("X-Forwarded-For", format!("10.1.0.{}", i + 1))
                .body(axum::body::Body::from(body.to_string()))
                .unwrap();
            router.oneshot(request).await.unwrap().status()
        });
    }

    let mut statuses = Vec::new();
    while let Some(status) = set.join_next().await {
        statuses.push(status.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert!(statuses.iter().filter(|s| **s != StatusCode::CREATED).all(|s| *s == StatusCode::CONFLICT));
}

#[tokio::test]
async fn test_same_email_may_register_for_different_events() {
    let app = TestApp::new().await;
    let morning = app.seed_event(PricingType::Free, None, 0).await;
    let evening = app.seed_event(PricingType::Free, None, 0).await;

    app.register_ok(&morning.id, "both@example.com").await;
    app.register_ok(&evening.id, "both@example.com").await;
}

#[tokio::test]
async fn test_cancelled_registration_can_be_replaced() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Paid, None, 10_000).await;
    let first = app.register_ok(&event.id, "again@example.com").await;

    let response = app.admin(
        "PATCH",
        &format!("/api/v1/tickets?id={}", first["id"].as_str().unwrap()),
        Some(json!({"status": "CANCELLED"})),
    ).await;
    assert_eq!(response.status(), StatusCode::OK);

    let second = app.register_ok(&event.id, "again@example.com").await;
    assert_ne!(first["ticket_code"], second["ticket_code"]);
}

#[tokio::test]
async fn test_deleted_registration_can_be_replaced() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, None, 0).await;
    let first = app.register_ok(&event.id, "again@example.com").await;

    let response = app.admin("DELETE", &format!("/api/v1/tickets?id={}", first["id"].as_str().unwrap()), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    app.register_ok(&event.id, "again@example.com").await;
}

#[tokio::test]
async fn test_duplicate_is_reported_even_when_sold_out() {
    let app = TestApp::new().await;
    let event = app.seed_event(PricingType::Free, Some(1), 0).await;
    app.register_ok(&event.id, "only@example.com").await;

    let response = app.register(registration(&event.id, "only@example.com"), "203.0.113.20").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
