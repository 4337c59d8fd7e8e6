use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{self, keys};
use crate::dreams::{self, Dream};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::{self, FeedEntry};

/// Peek at the candidate new-feed list without side effects: nothing is
/// marked seen and the cached artifact stays put. Computes and caches the
/// list when absent.
///
/// Hybrid fan-out: completed dreams were already pushed to each producer's
/// bounded outbox (fan-out-on-write); here the requester's own outbox is
/// merged with every followee's at read time (fan-out-on-read), windowed,
/// deduplicated against the seen-set, ranked and truncated.
pub async fn peek(
    state: &AppState,
    user_id: Uuid,
    since: OffsetDateTime,
) -> AppResult<Vec<FeedEntry>> {
    let user = users::services::get_user(state, user_id).await?;

    let feed_key = keys::new_feed(user_id);
    if let Some(cached) =
        cache::get_json::<Vec<FeedEntry>>(state.cache.as_ref(), &feed_key).await?
    {
        debug!(%user_id, entries = cached.len(), "new-feed cache hit");
        return Ok(cached);
    }

    // Own outbox first, then every followee's. A vanished followee is
    // skipped rather than failing the whole merge.
    let mut candidates: Vec<FeedEntry> = user.outbox.0.clone();
    for followee in &user.following {
        match users::services::get_user(state, *followee).await {
            Ok(followee_user) => candidates.extend(followee_user.outbox.0.iter().cloned()),
            Err(AppError::NotFound { .. }) => {
                warn!(%user_id, followee = %followee, "followee no longer exists, skipping")
            }
            Err(err) => return Err(err),
        }
    }

    let windowed = window_filter(candidates, since);
    if windowed.is_empty() {
        return Ok(Vec::new());
    }

    // One batched membership query; a missing seen-set reads as all-unseen.
    let ids: Vec<String> = windowed.iter().map(|f| f.dream.to_string()).collect();
    let seen = state
        .cache
        .set_contains(&keys::seen(user_id), &ids)
        .await?;
    let fresh = drop_seen(windowed, &seen);
    if fresh.is_empty() {
        return Ok(Vec::new());
    }

    let ranked = rank_and_truncate(fresh, state.config.feed.feed_limit);

    cache::set_json(
        state.cache.as_ref(),
        &feed_key,
        &ranked,
        state.config.cache.new_feed,
    )
    .await?;

    Ok(ranked)
}

/// Consume the new feed: resolve each candidate to its full dream, mark
/// every candidate id seen, and invalidate the cached artifact so the next
/// read recomputes only genuinely new items. The invalidation happens even
/// when resolution fails partway.
pub async fn consume(
    state: &AppState,
    user_id: Uuid,
    since: OffsetDateTime,
) -> AppResult<Vec<Dream>> {
    let result = consume_inner(state, user_id, since).await;

    if let Err(err) = state.cache.invalidate(&keys::new_feed(user_id)).await {
        warn!(error = %err, %user_id, "failed to invalidate new-feed cache");
    }

    result
}

async fn consume_inner(
    state: &AppState,
    user_id: Uuid,
    since: OffsetDateTime,
) -> AppResult<Vec<Dream>> {
    let entries = peek(state, user_id, since).await?;
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let mut feed = Vec::with_capacity(entries.len());
    for entry in &entries {
        match dreams::services::get_dream(state, entry.dream).await {
            Ok(dream) => feed.push(dream),
            // A deleted dream leaves a dangling pointer; skip it but still
            // count it as delivered below.
            Err(AppError::NotFound { .. }) => {
                warn!(dream_id = %entry.dream, %user_id, "feed points at missing dream")
            }
            Err(err) => return Err(err),
        }
    }

    let ids: Vec<String> = entries.iter().map(|f| f.dream.to_string()).collect();
    let added = state.cache.set_add(&keys::seen(user_id), &ids).await?;
    debug!(%user_id, delivered = feed.len(), marked_seen = added, "feed consumed");

    Ok(feed)
}

/// Keep entries generated strictly after the cutoff.
fn window_filter(entries: Vec<FeedEntry>, since: OffsetDateTime) -> Vec<FeedEntry> {
    entries
        .into_iter()
        .filter(|entry| entry.generated > since)
        .collect()
}

/// Drop entries flagged as already seen. `flags` is positionally aligned
/// with `entries`.
fn drop_seen(entries: Vec<FeedEntry>, flags: &[bool]) -> Vec<FeedEntry> {
    entries
        .into_iter()
        .zip(flags.iter().copied())
        .filter_map(|(entry, seen)| (!seen).then_some(entry))
        .collect()
}

/// Most recent first; the stable sort keeps concatenation order for ties.
fn rank_and_truncate(mut entries: Vec<FeedEntry>, limit: usize) -> Vec<FeedEntry> {
    entries.sort_by(|a, b| b.generated.cmp(&a.generated));
    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use sqlx::types::Json;
    use time::Duration;

    use super::*;
    use crate::dreams::DreamStatus;
    use crate::users::User;

    fn entry(dream: Uuid, minutes_ago: i64) -> FeedEntry {
        FeedEntry {
            dream,
            generated: OffsetDateTime::now_utc() - Duration::minutes(minutes_ago),
        }
    }

    fn test_user(id: Uuid, following: Vec<Uuid>, outbox: Vec<FeedEntry>) -> User {
        User {
            id,
            username: format!("user-{id}"),
            email: format!("{id}@example.com"),
            password_hash: String::new(),
            following,
            followers: Vec::new(),
            likes: Vec::new(),
            outbox: Json(outbox),
            inbox: Json(Vec::new()),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn test_dream(id: Uuid, author_id: Uuid) -> Dream {
        Dream {
            id,
            prompt: "test".into(),
            steps: 50,
            scale: 7.5,
            width: 512,
            height: 512,
            seed: 1,
            author: "someone".into(),
            author_id,
            status: DreamStatus::Done,
            images: vec![format!("{id}_512x512_origin")],
            likes: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
            finished_at: Some(OffsetDateTime::now_utc()),
        }
    }

    async fn seed_user(state: &AppState, user: &User) {
        cache::set_json(
            state.cache.as_ref(),
            &keys::user(user.id),
            user,
            StdDuration::from_secs(3600),
        )
        .await
        .unwrap();
    }

    async fn seed_dream(state: &AppState, dream: &Dream) {
        cache::set_json(
            state.cache.as_ref(),
            &keys::dream(dream.id),
            dream,
            StdDuration::from_secs(3600),
        )
        .await
        .unwrap();
    }

    fn cutoff() -> OffsetDateTime {
        OffsetDateTime::now_utc() - Duration::days(3)
    }

    #[test]
    fn window_filter_is_strict() {
        let cutoff = OffsetDateTime::now_utc();
        let fresh = FeedEntry {
            dream: Uuid::new_v4(),
            generated: cutoff + Duration::seconds(1),
        };
        let exact = FeedEntry {
            dream: Uuid::new_v4(),
            generated: cutoff,
        };
        let stale = FeedEntry {
            dream: Uuid::new_v4(),
            generated: cutoff - Duration::seconds(1),
        };

        let kept = window_filter(vec![fresh.clone(), exact, stale], cutoff);
        assert_eq!(kept, vec![fresh]);
    }

    #[test]
    fn ranking_sorts_desc_and_truncates() {
        let old = entry(Uuid::new_v4(), 30);
        let newest = entry(Uuid::new_v4(), 1);
        let middle = entry(Uuid::new_v4(), 10);

        let ranked = rank_and_truncate(vec![old.clone(), newest.clone(), middle.clone()], 2);
        assert_eq!(ranked, vec![newest, middle]);
    }

    #[test]
    fn ranking_is_stable_for_ties() {
        let generated = OffsetDateTime::now_utc();
        let first = FeedEntry {
            dream: Uuid::new_v4(),
            generated,
        };
        let second = FeedEntry {
            dream: Uuid::new_v4(),
            generated,
        };

        let ranked = rank_and_truncate(vec![first.clone(), second.clone()], 10);
        assert_eq!(ranked, vec![first, second]);
    }

    #[test]
    fn drop_seen_filters_flagged_entries() {
        let keep = entry(Uuid::new_v4(), 1);
        let gone = entry(Uuid::new_v4(), 2);
        let kept = drop_seen(vec![keep.clone(), gone], &[false, true]);
        assert_eq!(kept, vec![keep]);
    }

    #[tokio::test]
    async fn peek_merges_own_and_followee_outboxes() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let followee = Uuid::new_v4();

        let mine = entry(Uuid::new_v4(), 20);
        let theirs = entry(Uuid::new_v4(), 5);
        seed_user(&state, &test_user(me, vec![followee], vec![mine.clone()])).await;
        seed_user(&state, &test_user(followee, vec![], vec![theirs.clone()])).await;

        let feed = peek(&state, me, cutoff()).await.unwrap();
        // Most recent first, regardless of whose outbox it came from.
        assert_eq!(feed, vec![theirs, mine]);

        // The computed list is cached under the shared artifact key.
        let cached: Option<Vec<FeedEntry>> =
            cache::get_json(state.cache.as_ref(), &keys::new_feed(me))
                .await
                .unwrap();
        assert_eq!(cached.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn peek_has_no_side_effects() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let item = entry(Uuid::new_v4(), 1);
        seed_user(&state, &test_user(me, vec![], vec![item.clone()])).await;

        let first = peek(&state, me, cutoff()).await.unwrap();
        let second = peek(&state, me, cutoff()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![item]);
    }

    #[tokio::test]
    async fn peek_excludes_entries_outside_window() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let fresh = entry(Uuid::new_v4(), 60);
        let ancient = entry(Uuid::new_v4(), 60 * 24 * 10);
        seed_user(
            &state,
            &test_user(me, vec![], vec![fresh.clone(), ancient]),
        )
        .await;

        let feed = peek(&state, me, cutoff()).await.unwrap();
        assert_eq!(feed, vec![fresh]);
    }

    #[tokio::test]
    async fn consume_marks_seen_and_dedups_next_read() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let followee = Uuid::new_v4();
        let dream_id = Uuid::new_v4();

        seed_user(&state, &test_user(me, vec![followee], vec![])).await;
        seed_user(
            &state,
            &test_user(followee, vec![], vec![entry(dream_id, 5)]),
        )
        .await;
        seed_dream(&state, &test_dream(dream_id, followee)).await;

        let delivered = consume(&state, me, cutoff()).await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, dream_id);

        // No new activity: the dream must not be delivered again.
        let again = consume(&state, me, cutoff()).await.unwrap();
        assert!(again.is_empty());

        // Peek agrees; the artifact was invalidated and recomputed empty.
        let peeked = peek(&state, me, cutoff()).await.unwrap();
        assert!(peeked.is_empty());
    }

    #[tokio::test]
    async fn evicting_from_seen_set_resurfaces_the_dream() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let dream_id = Uuid::new_v4();

        seed_user(&state, &test_user(me, vec![], vec![entry(dream_id, 5)])).await;
        seed_dream(&state, &test_dream(dream_id, me)).await;

        assert_eq!(consume(&state, me, cutoff()).await.unwrap().len(), 1);
        assert!(consume(&state, me, cutoff()).await.unwrap().is_empty());

        state
            .cache
            .set_remove(&keys::seen(me), &[dream_id.to_string()])
            .await
            .unwrap();

        let resurfaced = consume(&state, me, cutoff()).await.unwrap();
        assert_eq!(resurfaced.len(), 1);
        assert_eq!(resurfaced[0].id, dream_id);
    }

    #[tokio::test]
    async fn consume_drains_backlog_in_feed_limit_batches() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let followee = Uuid::new_v4();
        let limit = state.config.feed.feed_limit;

        let backlog = limit + 4;
        let mut outbox = Vec::new();
        for i in 0..backlog {
            let dream_id = Uuid::new_v4();
            outbox.push(entry(dream_id, i as i64 + 1));
            seed_dream(&state, &test_dream(dream_id, followee)).await;
        }
        seed_user(&state, &test_user(me, vec![followee], vec![])).await;
        seed_user(&state, &test_user(followee, vec![], outbox)).await;

        // First batch is capped at the limit, newest first.
        let first = consume(&state, me, cutoff()).await.unwrap();
        assert_eq!(first.len(), limit);

        // Second batch returns the remaining unseen items, then exhaustion.
        let second = consume(&state, me, cutoff()).await.unwrap();
        assert_eq!(second.len(), backlog - limit);

        assert!(consume(&state, me, cutoff()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn peek_result_never_exceeds_feed_limit() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let limit = state.config.feed.feed_limit;

        let outbox: Vec<FeedEntry> = (0..limit + 10)
            .map(|i| entry(Uuid::new_v4(), i as i64 + 1))
            .collect();
        seed_user(&state, &test_user(me, vec![], outbox)).await;

        let feed = peek(&state, me, cutoff()).await.unwrap();
        assert_eq!(feed.len(), limit);
    }

    #[tokio::test]
    async fn followee_with_empty_outbox_contributes_nothing() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let quiet = Uuid::new_v4();
        let mine = entry(Uuid::new_v4(), 1);

        seed_user(&state, &test_user(quiet, vec![], vec![])).await;
        seed_user(&state, &test_user(me, vec![quiet], vec![mine.clone()])).await;

        let feed = peek(&state, me, cutoff()).await.unwrap();
        assert_eq!(feed, vec![mine]);
    }
}
