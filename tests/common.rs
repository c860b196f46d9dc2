#![allow(dead_code)]

use admission_backend::{
    api::extractors::auth::{Claims, ROLE_ADMIN},
    api::router::create_router,
    config::Config,
    domain::models::event::{Event, NewEventParams, PricingType},
    domain::models::ticket::Ticket,
    domain::ports::{EmailService, NotificationDispatcher, NotificationKind, TicketCodeGenerator},
    domain::services::ticket_code::RandomTicketCodeGenerator,
    error::AppError,
    infra::factory::{assemble_state, connect_sqlite, Overrides, Repositories},
    state::AppState,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use sqlx::{Pool, Sqlite};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const JWT_AUDIENCE: &str = "admission-admin";

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
    pub attachment_name: Option<String>,
    pub attachment: Option<Vec<u8>>,
}

/// Records every message instead of sending it. Flip `fail` to make the
/// relay reject deliveries.
#[derive(Default)]
pub struct MockEmailService {
    pub sent: Mutex<Vec<SentEmail>>,
    pub fail: AtomicBool,
}

impl MockEmailService {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        attachment_name: Option<&str>,
        attachment_data: Option<&[u8]>
    ) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Notification("relay said no".into()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
            attachment_name: attachment_name.map(str::to_string),
            attachment: attachment_data.map(<[u8]>::to_vec),
        });
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl NotificationDispatcher for FailingNotifier {
    async fn schedule(&self, _ticket: &Ticket, _kind: NotificationKind) -> Result<(), AppError> {
        Err(AppError::Notification("queue unavailable".into()))
    }
}

/// Hands out the scripted codes first, then random ones.
pub struct ScriptedCodeGenerator {
    script: Mutex<VecDeque<String>>,
}

impl ScriptedCodeGenerator {
    pub fn new(codes: &[&str]) -> Self {
        Self { script: Mutex::new(codes.iter().map(|c| c.to_string()).collect()) }
    }
}

impl TicketCodeGenerator for ScriptedCodeGenerator {
    fn generate(&self) -> String {
        self.script.lock().unwrap().pop_front()
            .unwrap_or_else(|| RandomTicketCodeGenerator.generate())
    }
}

pub struct RepeatingCodeGenerator(pub String);

impl TicketCodeGenerator for RepeatingCodeGenerator {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

pub fn test_config(db_url: &str) -> Config {
    Config {
        database_url: db_url.to_string(),
        port: 0,
        public_base_url: "https://tickets.test".to_string(),
        mail_service_url: "http://localhost".to_string(),
        mail_service_token: "token".to_string(),
        admin_jwt_secret: JWT_SECRET.to_string(),
        admin_jwt_audience: JWT_AUDIENCE.to_string(),
        rate_limit_ip_max: 1000,
        rate_limit_email_max: 1000,
        rate_limit_window_ms: 60_000,
        trust_forwarded_for: true,
        ticket_code_max_attempts: 5,
        pending_hold_minutes: None,
        sweep_expired_holds: false,
        worker_poll_interval_secs: 1,
        job_max_attempts: 3,
        job_lease_secs: 300,
        log_dir: "./logs".to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub email: Arc<MockEmailService>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(|_| {}, Overrides::default()).await
    }

    pub async fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(configure, Overrides::default()).await
    }

    pub async fn build(configure: impl FnOnce(&mut Config), overrides: Overrides) -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let pool = connect_sqlite(&db_url).await.expect("Failed to open test db");

        let mut config = test_config(&db_url);
        configure(&mut config);

        let email = Arc::new(MockEmailService::default());
        let state = assemble_state(&config, Repositories::sqlite(pool.clone()), email.clone(), overrides)
            .expect("Failed to assemble state");
        let state = Arc::new(state);
        let router = create_router(state.clone());

        Self { router, pool, db_filename, state, email }
    }

    pub async fn seed_event(&self, pricing_type: PricingType, capacity: Option<i64>, ticket_price: i64) -> Event {
        let event = Event::new(NewEventParams {
            title: "Seminar Karier".into(),
            location: "Auditorium".into(),
            starts_at: Utc::now() + Duration::days(7),
            ends_at: Utc::now() + Duration::days(7) + Duration::hours(3),
            capacity,
            pricing_type,
            ticket_price,
            is_published: true,
        });
        self.state.event_repo.create(&event).await.expect("Failed to seed event")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn register(&self, body: Value, client_ip: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/tickets")
                .header(header::CONTENT_TYPE, "application/json")
                .header("X-Forwarded-For", client_ip)
                .body(Body::from(body.to_string()))
                .unwrap()
        ).await
    }

    /// Registers and returns the created ticket, asserting a 201.
    pub async fn register_ok(&self, event_id: &str, email: &str) -> Value {
        let response = self.register(registration(event_id, email), "198.51.100.10").await;
        assert_eq!(response.status(), 201, "registration for {email} failed");
        parse_body(response).await
    }

    pub fn token(&self, role: &str) -> String {
        mint_token(role, "csrf-test-token")
    }

    pub async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> Response {
        self.as_role(ROLE_ADMIN, method, uri, body).await
    }

    pub async fn as_role(&self, role: &str, method: &str, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token(role)));
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}

pub fn mint_token(role: &str, csrf: &str) -> String {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: format!("user-{role}"),
        role: role.to_string(),
        aud: JWT_AUDIENCE.to_string(),
        exp: now + 3600,
        iat: now,
        csrf: csrf.to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

pub fn registration(event_id: &str, email: &str) -> Value {
    serde_json::json!({
        "event_id": event_id,
        "full_name": "Rina Kartika",
        "email": email,
        "whatsapp": "+62 812 0000 0000",
        "school_or_campus": "Universitas Contoh",
    })
}

pub async fn parse_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
