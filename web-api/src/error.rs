use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use painscout_core::{BillingError, CoreError, ErrorExt};
use serde_json::json;
use tracing::{error, warn};

/// `CoreError` rendered as `{error, code}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl<E> From<E> for ApiError
where
    E: Into<CoreError>,
{
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Billing(billing) => match billing {
            BillingError::MissingSignature | BillingError::InvalidPayload { .. } => {
                StatusCode::BAD_REQUEST
            }
            BillingError::InvalidSignature => StatusCode::UNAUTHORIZED,
            BillingError::EventInFlight { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        CoreError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        CoreError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        CoreError::RedditApi(_) | CoreError::Llm(_) | CoreError::Network(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn code_for(err: &CoreError) -> String {
    match err {
        CoreError::Billing(billing) => billing.error_code(),
        CoreError::RedditApi(reddit) => reddit.error_code(),
        CoreError::Llm(llm) => llm.error_code(),
        other => other.error_code(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(error = %self.0, status = status.as_u16(), "Request rejected");
        }

        let body = json!({
            "error": self.0.user_friendly_message(),
            "code": code_for(&self.0),
        });
        (status, Json(body)).into_response()
    }
}
