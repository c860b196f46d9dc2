use axum::http::{HeaderMap, HeaderValue};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitScope {
    Ip,
    Email,
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Ip => "ip",
            RateLimitScope::Email => "email",
        }
    }
}

/// One fixed window of hits for a key. Times are unix milliseconds so the
/// same arithmetic works on SQLite and Postgres.
#[derive(Debug, Clone, FromRow)]
pub struct RateLimitBucket {
    pub bucket_key: String,
    pub window_start_ms: i64,
    pub expires_at_ms: i64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub scope: RateLimitScope,
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_ms: i64,
    #[serde(skip)]
    pub now_ms: i64,
}

impl RateLimitDecision {
    pub fn from_bucket(scope: RateLimitScope, limit: u32, bucket: &RateLimitBucket, now_ms: i64) -> Self {
        let used = bucket.count.max(0) as u64;
        let limit_u64 = u64::from(limit);
        Self {
            scope,
            allowed: used <= limit_u64,
            limit,
            remaining: limit_u64.saturating_sub(used) as u32,
            reset_at_ms: bucket.expires_at_ms,
            now_ms,
        }
    }

    pub fn reset_at_secs(&self) -> i64 {
        (self.reset_at_ms + 999) / 1000
    }

    pub fn retry_after_secs(&self) -> u64 {
        let wait_ms = (self.reset_at_ms - self.now_ms).max(0) as u64;
        wait_ms.div_ceil(1000).max(1)
    }

    /// Picks the decision a caller should see: a rejecting scope wins,
    /// otherwise the scope with the fewest remaining hits.
    pub fn most_restrictive(decisions: Vec<RateLimitDecision>) -> Option<RateLimitDecision> {
        decisions
            .into_iter()
            .min_by_key(|d| (d.allowed, d.remaining))
    }

    pub fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(self.reset_at_secs()));
        headers.insert("x-ratelimit-scope", HeaderValue::from_static(self.scope.as_str()));
    }
}
