use std::env;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub public_base_url: String,
    pub mail_service_url: String,
    pub mail_service_token: String,
    pub admin_jwt_secret: String,
    pub admin_jwt_audience: String,
    pub rate_limit_ip_max: u32,
    pub rate_limit_email_max: u32,
    pub rate_limit_window_ms: i64,
    pub trust_forwarded_for: bool,
    pub ticket_code_max_attempts: u32,
    pub pending_hold_minutes: Option<i64>,
    pub sweep_expired_holds: bool,
    pub worker_poll_interval_secs: u64,
    pub job_max_attempts: u32,
    pub job_lease_secs: i64,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port: parsed("PORT", 3000)?,
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            mail_service_url: env::var("MAIL_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8000/api/v1/send".to_string()),
            mail_service_token: env::var("MAIL_SERVICE_TOKEN").unwrap_or_else(|_| "test-token-1".to_string()),
            admin_jwt_secret: required("ADMIN_JWT_SECRET")?,
            admin_jwt_audience: env::var("ADMIN_JWT_AUDIENCE").unwrap_or_else(|_| "admission-admin".to_string()),
            rate_limit_ip_max: parsed("RATE_LIMIT_IP_MAX", 20)?,
            rate_limit_email_max: parsed("RATE_LIMIT_EMAIL_MAX", 5)?,
            rate_limit_window_ms: parsed("RATE_LIMIT_WINDOW_MS", 60_000)?,
            trust_forwarded_for: parsed("TRUST_FORWARDED_FOR", true)?,
            ticket_code_max_attempts: parsed("TICKET_CODE_MAX_ATTEMPTS", 5)?,
            pending_hold_minutes: optional("PENDING_HOLD_MINUTES")?,
            sweep_expired_holds: parsed("SWEEP_EXPIRED_HOLDS", false)?,
            worker_poll_interval_secs: parsed("WORKER_POLL_INTERVAL_SECS", 5)?,
            job_max_attempts: parsed("JOB_MAX_ATTEMPTS", 3)?,
            job_lease_secs: parsed("JOB_LEASE_SECS", 300)?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string()),
        })
    }

    pub fn is_postgres(&self) -> bool {
        self.database_url.starts_with("postgres://") || self.database_url.starts_with("postgresql://")
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config(format!("{key} must be set")))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

fn optional<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}
