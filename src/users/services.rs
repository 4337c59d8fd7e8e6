use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{self, keys};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::repo;
use super::repo_types::{FeedEntry, User};

/// Cache-aside user lookup. The full record is always cached under one key
/// so readers never observe a projected subset.
pub async fn get_user(state: &AppState, id: Uuid) -> AppResult<User> {
    let key = keys::user(id);

    if let Some(user) = cache::get_json::<User>(state.cache.as_ref(), &key).await? {
        debug!(user_id = %id, "user cache hit");
        return Ok(user);
    }

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound { entity: "user" })?;

    cache::set_json(state.cache.as_ref(), &key, &user, state.config.cache.user).await?;
    Ok(user)
}

/// Append a feed pointer for a completed dream to its author's outbox,
/// applying the cap, then drop the author's cached record.
pub async fn push_feed(state: &AppState, author_id: Uuid, dream_id: Uuid) -> AppResult<()> {
    let entry = FeedEntry {
        dream: dream_id,
        generated: OffsetDateTime::now_utc(),
    };
    repo::push_outbox(&state.db, author_id, &entry, state.config.feed.outbox_limit).await?;

    state.cache.invalidate(&keys::user(author_id)).await?;
    Ok(())
}
