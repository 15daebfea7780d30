use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use painscout_core::{CoreError, Message, MessageOutcome, SendStatus, VariantStats};
use serde::Deserialize;
use uuid::Uuid;

use super::require;
use crate::auth::ApiKey;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageBody {
    user_id: String,
    pain_point_id: String,
    contact_username: String,
    #[serde(default = "default_variant")]
    template_variant: String,
    body: String,
}

fn default_variant() -> String {
    "A".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct OutcomeBody {
    outcome: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantsQuery {
    user_id: String,
}

async fn load(state: &AppState, id: &str) -> Result<Message, ApiError> {
    state.db.get_message(id).await?.ok_or_else(|| {
        ApiError(CoreError::NotFound {
            resource: format!("message {id}"),
        })
    })
}

pub async fn create_message(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateMessageBody>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    require("userId", &body.user_id)?;
    require("painPointId", &body.pain_point_id)?;
    require("contactUsername", &body.contact_username)?;
    require("body", &body.body)?;

    let message = Message {
        id: Uuid::new_v4().to_string(),
        user_id: body.user_id,
        pain_point_id: body.pain_point_id,
        contact_username: body.contact_username.trim_start_matches("u/").to_string(),
        template_variant: body.template_variant,
        body: body.body,
        send_status: SendStatus::Draft,
        outcome: None,
        created_at: Utc::now(),
        sent_at: None,
    };
    state.db.insert_message(&message).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Moves a message to `sent` or `failed`.
pub async fn set_status(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Message>, ApiError> {
    let status = SendStatus::from_str(body.status.trim()).map_err(|_| CoreError::InvalidInput {
        message: format!("unknown send status '{}'", body.status),
    })?;
    if status == SendStatus::Draft {
        return Err(ApiError(CoreError::InvalidInput {
            message: "status must be 'sent' or 'failed'".to_string(),
        }));
    }

    load(&state, &id).await?;
    state.db.set_message_status(&id, status, Utc::now()).await?;
    Ok(Json(load(&state, &id).await?))
}

pub async fn record_outcome(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<OutcomeBody>,
) -> Result<Json<Message>, ApiError> {
    let outcome = MessageOutcome::from_str(body.outcome.trim())?;
    if !state.db.record_message_outcome(&id, outcome).await? {
        return Err(ApiError(CoreError::NotFound {
            resource: format!("message {id}"),
        }));
    }
    Ok(Json(load(&state, &id).await?))
}

pub async fn variant_stats(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Query(params): Query<VariantsQuery>,
) -> Result<Json<Vec<VariantStats>>, ApiError> {
    require("userId", &params.user_id)?;
    Ok(Json(state.db.variant_stats(&params.user_id).await?))
}
