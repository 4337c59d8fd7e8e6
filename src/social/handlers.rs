use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::state::AppState;

use super::services;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/follow/:id", post(follow))
        .route("/follow/:id", delete(unfollow))
}

#[instrument(skip(state))]
pub async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(target): Path<Uuid>,
) -> AppResult<Json<Value>> {
    services::follow(&state, user.id, target).await?;
    info!(user_id = %user.id, %target, "followed");
    Ok(Json(json!({ "ok": true })))
}

#[instrument(skip(state))]
pub async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(target): Path<Uuid>,
) -> AppResult<Json<Value>> {
    services::unfollow(&state, user.id, target).await?;
    info!(user_id = %user.id, %target, "unfollowed");
    Ok(Json(json!({ "ok": true })))
}
