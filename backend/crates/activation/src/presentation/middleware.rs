//! Admin Middleware

use crate::application::config::ActivationConfig;
use crate::error::ActivationError;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use platform::crypto::constant_time_eq;
use std::sync::Arc;

/// Middleware that requires `Authorization: Bearer <admin key>`.
///
/// Without a configured key every admin request is refused.
pub async fn require_admin_key(
    State(config): State<Arc<ActivationConfig>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ActivationError> {
    let Some(expected) = config.admin_api_key.as_deref().filter(|key| !key.is_empty()) else {
        tracing::debug!("Admin API key not configured");
        return Err(ActivationError::Unauthorized);
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(next.run(req).await),
        _ => Err(ActivationError::Unauthorized),
    }
}
