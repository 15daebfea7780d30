use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use billing::signature::constant_time_eq;
use painscout_core::CoreError;

use crate::error::ApiError;
use crate::state::AppState;

/// Guard for routes that require the configured bearer key.
pub struct ApiKey;

impl FromRequestParts<Arc<AppState>> for ApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.api_key.as_deref() else {
            return Ok(ApiKey);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(ApiKey),
            Some(_) => Err(ApiError(CoreError::Unauthorized {
                reason: "invalid API key".to_string(),
            })),
            None => Err(ApiError(CoreError::Unauthorized {
                reason: "missing bearer token".to_string(),
            })),
        }
    }
}
