use axum::{
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};

use crate::api::dtos::requests::RegistrationRequest;
use crate::error::AppError;

/// Normalizes JSON and form-encoded registration bodies into one typed value.
pub struct RegistrationForm(pub RegistrationRequest);

impl<S> FromRequest<S> for RegistrationForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req.headers().get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(body) = Form::<RegistrationRequest>::from_request(req, state).await
                .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
            Ok(RegistrationForm(body))
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<RegistrationRequest>::from_request(req, state).await
                .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
            Ok(RegistrationForm(body))
        } else {
            Err(AppError::Validation("Unsupported content type, send JSON or form-encoded data".into()))
        }
    }
}
