use axum::{
    extract::{FromRequestParts, FromRef},
    http::{header::AUTHORIZATION, request::Parts, Method},
};
use crate::state::AppState;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_cookies::Cookies;
use jsonwebtoken::{decode, DecodingKey, Validation, Algorithm};
use tracing::Span;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_SCANNER: &str = "scanner";

/// Session claims minted by the external admin login.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub aud: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(default)]
    pub csrf: String,
}

pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.0.role == ROLE_ADMIN {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin role required".into()))
        }
    }

    /// Scanning is open to scanners and admins.
    pub fn require_scanner(&self) -> Result<(), AppError> {
        if self.0.role == ROLE_ADMIN || self.0.role == ROLE_SCANNER {
            Ok(())
        } else {
            Err(AppError::Forbidden("Scanner role required".into()))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let bearer = parts.headers.get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.trim().to_string());

        let (access_token, from_cookie) = match bearer {
            Some(token) => (token, false),
            None => {
                let cookies = parts.extensions.get::<Cookies>()
                    .ok_or(AppError::Internal)?;
                let token = cookies.get("access_token")
                    .ok_or(AppError::Unauthorized)?
                    .value()
                    .to_string();
                (token, true)
            }
        };

        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);

        let decoding_key = DecodingKey::from_secret(app_state.config.admin_jwt_secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[app_state.config.admin_jwt_audience.as_str()]);

        let token_data = decode::<Claims>(&access_token, &decoding_key, &validation)
            .map_err(|_| AppError::Unauthorized)?;

        // Browsers attach cookies on their own; bearer tokens are never ambient.
        let method = &parts.method;
        if from_cookie && method != Method::GET && method != Method::HEAD && method != Method::OPTIONS {
            let csrf_header_val = parts.headers.get("X-CSRF-Token")
                .and_then(|v| v.to_str().ok())
                .ok_or(AppError::Forbidden("Missing CSRF token".into()))?;

            if token_data.claims.csrf.is_empty() || csrf_header_val != token_data.claims.csrf {
                return Err(AppError::Forbidden("Invalid CSRF token".into()));
            }
        }

        Span::current().record("user_id", token_data.claims.sub.as_str());

        Ok(AuthUser(token_data.claims))
    }
}
