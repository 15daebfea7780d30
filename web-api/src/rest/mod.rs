pub mod ideas;
pub mod messages;
pub mod webhook;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use discovery_engine::{ContactPage, DiscoveryRequest};
use painscout_core::{CoreError, PageRequest};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::auth::ApiKey;
use crate::error::ApiError;
use crate::state::AppState;

// --- Query / body structs ---

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverBody {
    pain_point_id: String,
    page: Option<u32>,
    limit: Option<u32>,
    user_id: Option<String>,
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError(CoreError::InvalidInput {
            message: format!("{field} is required"),
        }));
    }
    Ok(())
}

// --- Handlers ---

/// DB liveness plus the Reddit clients' request counters and limiter state.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let reddit = json!({
        "trends": state.trends.source_status().await,
        "contacts": state.contacts.source_status().await,
    });

    match state.db.ping().await {
        Ok(()) => Json(json!({ "status": "ok", "reddit": reddit })).into_response(),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "reddit": reddit })),
            )
                .into_response()
        }
    }
}

pub async fn reddit_trends(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrendsQuery>,
) -> Result<Response, ApiError> {
    let summary = state.trends.summary(params.refresh).await?;
    Ok(Json(summary.as_ref()).into_response())
}

pub async fn discover_contacts(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Json(body): Json<DiscoverBody>,
) -> Result<Json<ContactPage>, ApiError> {
    require("painPointId", &body.pain_point_id)?;
    let request = DiscoveryRequest {
        pain_point_id: body.pain_point_id,
        page: PageRequest::new(body.page, body.limit),
        user_id: body.user_id.filter(|u| !u.trim().is_empty()),
    };
    Ok(Json(state.contacts.discover(&request).await?))
}
