use tracing::debug;
use uuid::Uuid;

use crate::cache::keys;
use crate::dreams::repo;
use crate::error::AppResult;
use crate::state::AppState;

/// Idempotent set-add on the dream's likes. The cached dream is not wiped;
/// its TTL is shortened so readers see the old like state for at most the
/// short staleness window.
pub async fn add_like(state: &AppState, user_id: Uuid, dream_id: Uuid) -> AppResult<()> {
    repo::add_like(&state.db, dream_id, user_id).await?;

    state
        .cache
        .shorten_ttl(&keys::dream(dream_id), state.config.cache.dream_short)
        .await?;

    debug!(%user_id, %dream_id, "like added");
    Ok(())
}

/// Idempotent set-remove; removing an absent like is a no-op.
pub async fn remove_like(state: &AppState, user_id: Uuid, dream_id: Uuid) -> AppResult<()> {
    repo::remove_like(&state.db, dream_id, user_id).await?;

    state
        .cache
        .shorten_ttl(&keys::dream(dream_id), state.config.cache.dream_short)
        .await?;

    debug!(%user_id, %dream_id, "like removed");
    Ok(())
}
