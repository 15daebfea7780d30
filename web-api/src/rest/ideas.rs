use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use painscout_core::{ContentKind, GeneratedContent, IdeaValidation, StartupIdea};
use serde::Deserialize;

use super::require;
use crate::auth::ApiKey;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdeaBody {
    user_id: String,
    pain_point_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentBody {
    user_id: String,
    idea_id: String,
    kind: String,
}

pub async fn create_idea(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateIdeaBody>,
) -> Result<(StatusCode, Json<StartupIdea>), ApiError> {
    require("userId", &body.user_id)?;
    require("painPointId", &body.pain_point_id)?;
    let idea = state
        .ideas
        .generate_idea(&body.user_id, &body.pain_point_id)
        .await?;
    Ok((StatusCode::CREATED, Json(idea)))
}

pub async fn validate_idea(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<IdeaValidation>, ApiError> {
    Ok(Json(state.ideas.validate_idea(&id).await?))
}

pub async fn create_content(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateContentBody>,
) -> Result<(StatusCode, Json<GeneratedContent>), ApiError> {
    require("userId", &body.user_id)?;
    require("ideaId", &body.idea_id)?;
    let kind = ContentKind::from_str(body.kind.trim())?;
    let content = state
        .ideas
        .generate_content(&body.user_id, &body.idea_id, kind)
        .await?;
    Ok((StatusCode::CREATED, Json(content)))
}
