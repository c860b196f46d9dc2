mod common;

use admission_backend::domain::models::event::PricingType;
use axum::http::{header, StatusCode};
use common::{parse_body, registration, TestApp};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_ip_scope_rejects_after_limit() {
    let app = TestApp::with_config(|c| {
        c.rate_limit_ip_max = 3;
        c.rate_limit_email_max = 100;
    }).await;
    let event = app.seed_event(PricingType::Free, None, 0).await;

    for i in 0..3 {
        let response = app.register(registration(&event.id, &format!("ip{i}@example.com")), "198.51.100.7").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let remaining: u32 = response.headers()["x-ratelimit-remaining"].to_str().unwrap().parse().unwrap();
        assert_eq!(remaining, 2 - i);
    }

    let response = app.register(registration(&event.id, "ip3@example.com"), "198.51.100.7").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-scope"], "ip");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = response.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(parse_body(response).await["code"], "RATE_LIMITED");

    // Another address is unaffected.
    let response = app.register(registration(&event.id, "ip4@example.com"), "198.51.100.8").await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_email_scope_follows_the_address_across_ips() {
    let app = TestApp::with_config(|c| {
        c.rate_limit_ip_max = 100;
        c.rate_limit_email_max = 2;
    }).await;
    let event = app.seed_event(PricingType::Free, None, 0).await;

    let first = app.register(registration(&event.id, "same@example.com"), "10.9.0.1").await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = app.register(registration(&event.id, "SAME@example.com"), "10.9.0.2").await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let third = app.register(registration(&event.id, "same@example.com "), "10.9.0.3").await;
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(third.headers()["x-ratelimit-scope"], "email");
}

#[tokio::test]
async fn test_failed_validation_still_counts_against_the_limit() {
    let app = TestApp::with_config(|c| c.rate_limit_ip_max = 2).await;
    let event = app.seed_event(PricingType::Free, None, 0).await;

    for _ in 0..2 {
        let response = app.register(json!({"event_id": event.id}), "192.0.2.44").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app.register(registration(&event.id, "valid@example.com"), "192.0.2.44").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rejected_attempts_do_not_create_tickets() {
    let app = TestApp::with_config(|c| c.rate_limit_ip_max = 1).await;
    let event = app.seed_event(PricingType::Free, None, 0).await;

    app.register(registration(&event.id, "a@example.com"), "192.0.2.50").await;
    let response = app.register(registration(&event.id, "b@example.com"), "192.0.2.50").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let (_, total) = app.state.ticket_repo.list(&Default::default()).await.unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_window_resets_after_it_elapses() {
    let app = TestApp::with_config(|c| {
        c.rate_limit_ip_max = 1;
        c.rate_limit_window_ms = 300;
    }).await;
    let event = app.seed_event(PricingType::Free, None, 0).await;

    let response = app.register(registration(&event.id, "w1@example.com"), "192.0.2.60").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = app.register(registration(&event.id, "w2@example.com"), "192.0.2.60").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let response = app.register(registration(&event.id, "w3@example.com"), "192.0.2.60").await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_honeypot_submissions_skip_the_limiter() {
    let app = TestApp::with_config(|c| c.rate_limit_ip_max = 1).await;
    let event = app.seed_event(PricingType::Free, None, 0).await;

    for _ in 0..3 {
        let mut body = registration(&event.id, "bot@example.com");
        body["website"] = json!("spam");
        let response = app.register(body, "192.0.2.70").await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app.register(registration(&event.id, "human@example.com"), "192.0.2.70").await;
    assert_eq!(response.status(), StatusCode::CREATED);
}
