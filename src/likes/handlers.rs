use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::state::AppState;

use super::services;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dreams/:id/like", post(add_like))
        .route("/dreams/:id/like", delete(remove_like))
}

#[instrument(skip(state))]
pub async fn add_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(dream_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    services::add_like(&state, user.id, dream_id).await?;
    Ok(Json(json!({ "ok": true })))
}

#[instrument(skip(state))]
pub async fn remove_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(dream_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    services::remove_like(&state, user.id, dream_id).await?;
    Ok(Json(json!({ "ok": true })))
}
