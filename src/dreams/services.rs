use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{self, keys};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::dto::NewDreamRequest;
use super::repo_types::{Dream, DreamStatus};

/// Insert a pending dream and hand it to the worker via the queue.
pub async fn create_dream(
    state: &AppState,
    author_id: Uuid,
    author: &str,
    req: NewDreamRequest,
) -> AppResult<Dream> {
    let prompt = req.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(AppError::Validation("prompt must not be empty".into()));
    }

    let dream = Dream {
        id: Uuid::new_v4(),
        prompt,
        steps: req.steps,
        scale: req.scale,
        width: req.width,
        height: req.height,
        seed: req.seed,
        author: author.to_string(),
        author_id,
        status: DreamStatus::Pending,
        images: Vec::new(),
        likes: Vec::new(),
        created_at: OffsetDateTime::now_utc(),
        finished_at: None,
    };

    Dream::insert(&state.db, &dream).await?;
    state.queue.enqueue(dream.id).await?;

    Ok(dream)
}

/// Cache-aside dream lookup.
pub async fn get_dream(state: &AppState, id: Uuid) -> AppResult<Dream> {
    let key = keys::dream(id);

    if let Some(dream) = cache::get_json::<Dream>(state.cache.as_ref(), &key).await? {
        debug!(dream_id = %id, "dream cache hit");
        return Ok(dream);
    }

    let dream = Dream::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound { entity: "dream" })?;

    cache::set_json(state.cache.as_ref(), &key, &dream, state.config.cache.dream).await?;
    Ok(dream)
}

/// Persist a mutated dream. With `keep_cache` the cached copy survives for
/// a short staleness window instead of being wiped outright.
pub async fn update_dream(state: &AppState, dream: &Dream, keep_cache: bool) -> AppResult<()> {
    Dream::update(&state.db, dream).await?;

    let key = keys::dream(dream.id);
    if keep_cache {
        state
            .cache
            .shorten_ttl(&key, state.config.cache.dream_short)
            .await?;
    } else {
        state.cache.invalidate(&key).await?;
    }
    Ok(())
}
