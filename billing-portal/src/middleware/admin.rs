//! Admin context extractor.
//!
//! Extracts the acting administrator's identity from the `X-Admin-Id` header.
//! The header is set by the authenticating front end after admin login; token
//! issuance and verification live outside this service.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use portal_core::error::AppError;
use uuid::Uuid;

/// Acting administrator, recorded on every payment transition.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub admin_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("X-Admin-Id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!("Missing X-Admin-Id header"))
            })?;

        let admin_id = Uuid::parse_str(raw).map_err(|_| {
            AppError::AuthError(anyhow::anyhow!("Invalid X-Admin-Id header"))
        })?;

        let span = tracing::Span::current();
        span.record("admin_id", raw);

        Ok(AdminContext { admin_id })
    }
}
