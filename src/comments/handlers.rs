use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::state::AppState;

use super::dto::{CreateCommentRequest, PageQuery};
use super::repo_types::Comment;
use super::services;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dreams/:id/comments", post(add_comment))
        .route("/dreams/:id/comments", get(list_comments))
}

#[instrument(skip(state, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(dream_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = services::add_comment(&state, user.id, dream_id, &payload.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(dream_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Vec<Comment>>> {
    let comments = services::get_page(&state, dream_id, query.page).await?;
    Ok(Json(comments))
}
