use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::domain::models::rate_limit::{RateLimitDecision, RateLimitScope};
use crate::domain::ports::RateLimitRepository;
use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
pub struct RegistrationLimits {
    pub ip_max: u32,
    pub email_max: u32,
    pub window_ms: i64,
}

/// Shared-store throttle. Every call counts exactly one hit per scope, no
/// matter what the request later turns into.
pub struct RateLimiter {
    repo: Arc<dyn RateLimitRepository>,
    limits: RegistrationLimits,
}

impl RateLimiter {
    pub fn new(repo: Arc<dyn RateLimitRepository>, limits: RegistrationLimits) -> Self {
        Self { repo, limits }
    }

    pub async fn consume(&self, scope: RateLimitScope, key: &str, limit: u32, window_ms: i64) -> Result<RateLimitDecision, AppError> {
        let now_ms = Utc::now().timestamp_millis();
        let bucket = self.repo.hit(key, now_ms, window_ms).await?;
        let decision = RateLimitDecision::from_bucket(scope, limit, &bucket, now_ms);
        debug!(scope = scope.as_str(), count = bucket.count, remaining = decision.remaining, "rate limit hit");
        Ok(decision)
    }

    /// Gate for a registration attempt. The email scope is only checked when
    /// the caller supplied one. Returns the most restrictive decision, or
    /// `RateLimited` when any scope is exhausted.
    pub async fn check_registration(&self, client_ip: &str, email: Option<&str>) -> Result<RateLimitDecision, AppError> {
        let mut decisions = vec![
            self.consume(RateLimitScope::Ip, &ip_key(client_ip), self.limits.ip_max, self.limits.window_ms).await?,
        ];

        if let Some(email) = email.filter(|e| !e.is_empty()) {
            decisions.push(
                self.consume(RateLimitScope::Email, &email_key(email), self.limits.email_max, self.limits.window_ms).await?,
            );
        }

        let decision = RateLimitDecision::most_restrictive(decisions).ok_or(AppError::Internal)?;
        if !decision.allowed {
            info!(scope = decision.scope.as_str(), client_ip = %client_ip, "registration rate limited");
            return Err(AppError::RateLimited(decision));
        }
        Ok(decision)
    }
}

fn ip_key(ip: &str) -> String {
    format!("registration:ip:{ip}")
}

/// Bucket keys never hold raw addresses.
fn email_key(normalized_email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_email.as_bytes());
    format!("registration:email:{}", hex::encode(hasher.finalize()))
}
