use axum::{extract::State, routing::get, Json, Router};
use time::{Duration, OffsetDateTime};
use tracing::instrument;

use crate::auth::CurrentUser;
use crate::dreams::Dream;
use crate::error::AppResult;
use crate::state::AppState;
use crate::users::FeedEntry;

use super::services;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feeds", get(consume_feeds))
        .route("/feeds/new", get(peek_feeds))
}

fn window_cutoff(state: &AppState) -> OffsetDateTime {
    OffsetDateTime::now_utc() - Duration::days(state.config.feed.window_days)
}

/// Candidate list only; nothing is marked seen.
#[instrument(skip(state))]
pub async fn peek_feeds(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<FeedEntry>>> {
    let feeds = services::peek(&state, user.id, window_cutoff(&state)).await?;
    Ok(Json(feeds))
}

/// Full dreams; every delivered id is marked seen.
#[instrument(skip(state))]
pub async fn consume_feeds(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Dream>>> {
    let feeds = services::consume(&state, user.id, window_cutoff(&state)).await?;
    Ok(Json(feeds))
}
