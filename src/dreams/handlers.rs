use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::state::AppState;

use super::dto::{DreamCreatedResponse, DreamStatusResponse, NewDreamRequest};
use super::services;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dreams", post(create_dream))
        .route("/dreams/:id/status", get(dream_status))
}

#[instrument(skip(state, payload))]
pub async fn create_dream(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<NewDreamRequest>,
) -> AppResult<Json<DreamCreatedResponse>> {
    let dream = services::create_dream(&state, user.id, &user.username, payload).await?;
    info!(dream_id = %dream.id, author = %user.username, "dream enqueued");
    Ok(Json(DreamCreatedResponse { id: dream.id }))
}

#[instrument(skip(state))]
pub async fn dream_status(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DreamStatusResponse>> {
    let dream = services::get_dream(&state, id).await?;
    Ok(Json(DreamStatusResponse {
        status: dream.status,
    }))
}
