use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use billing::{WebhookRequest, EVENT_ID_HEADER, SIGNATURE_HEADER};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// Razorpay delivery endpoint. The body is taken as raw bytes so the
/// signature is checked over exactly what was sent.
pub async fn razorpay_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let outcome = state
        .webhooks
        .process(WebhookRequest {
            body: &body,
            signature: header(SIGNATURE_HEADER),
            event_id: header(EVENT_ID_HEADER),
        })
        .await?;

    if outcome.is_duplicate() {
        Ok(Json(json!({ "received": true, "duplicate": true })))
    } else {
        Ok(Json(json!({ "received": true })))
    }
}
