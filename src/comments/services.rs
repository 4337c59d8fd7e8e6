use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{self, keys};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::repo_types::Comment;

pub async fn add_comment(
    state: &AppState,
    author_id: Uuid,
    dream_id: Uuid,
    text: &str,
) -> AppResult<Comment> {
    let text = text.trim();
    if text.is_empty() || text.len() > state.config.comments.max_len {
        return Err(AppError::Validation("invalid comment length".into()));
    }

    let comment = Comment {
        id: Uuid::new_v4(),
        dream_id,
        author_id,
        text: text.to_string(),
        likes: Vec::new(),
        created_at: OffsetDateTime::now_utc(),
    };

    Comment::insert(&state.db, &comment).await?;
    Ok(comment)
}

/// Offset-paged, cache-aside comment retrieval. Only non-empty pages are
/// cached, so a not-yet-populated page does not pin an empty result.
pub async fn get_page(state: &AppState, dream_id: Uuid, page: i64) -> AppResult<Vec<Comment>> {
    if page < 0 {
        return Err(AppError::Validation("page must be non-negative".into()));
    }

    let key = keys::comments(dream_id, page);
    if let Some(comments) = cache::get_json::<Vec<Comment>>(state.cache.as_ref(), &key).await? {
        debug!(%dream_id, page, "comments cache hit");
        return Ok(comments);
    }

    let (limit, offset) = page_window(state.config.comments.per_page, page);
    let comments = Comment::page(&state.db, dream_id, limit, offset).await?;

    if !comments.is_empty() {
        cache::set_json(
            state.cache.as_ref(),
            &key,
            &comments,
            state.config.cache.comments,
        )
        .await?;
    }

    Ok(comments)
}

/// Limit and offset for a zero-based page index.
fn page_window(per_page: i64, page: i64) -> (i64, i64) {
    (per_page, per_page * page)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn test_comment(dream_id: Uuid, text: &str) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            dream_id,
            author_id: Uuid::new_v4(),
            text: text.into(),
            likes: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_comments() {
        let state = AppState::fake();
        let author = Uuid::new_v4();
        let dream = Uuid::new_v4();

        let err = add_comment(&state, author, dream, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let oversized = "x".repeat(state.config.comments.max_len + 1);
        let err = add_comment(&state, author, dream, &oversized)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn page_windows_partition_a_collection() {
        let collection: Vec<i64> = (0..20).collect();
        let per_page = 7;

        let fetch = |page: i64| {
            let (limit, offset) = page_window(per_page, page);
            collection
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .copied()
                .collect::<Vec<_>>()
        };

        assert_eq!(fetch(0).len(), 7);
        assert_eq!(fetch(1).len(), 7);
        assert_eq!(fetch(2).len(), 6);
        assert!(fetch(3).is_empty());

        // Concatenated pages reproduce the collection: no overlap, no gaps.
        let all: Vec<i64> = (0..4).flat_map(fetch).collect();
        assert_eq!(all, collection);
    }

    #[test]
    fn oversized_page_returns_the_whole_collection() {
        let collection: Vec<i64> = (0..20).collect();
        let (limit, offset) = page_window(25, 0);

        let page: Vec<i64> = collection
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .copied()
            .collect();
        assert_eq!(page, collection);
        // The next page starts past the end.
        assert!(collection.get(page_window(25, 1).1 as usize).is_none());
    }

    #[tokio::test]
    async fn rejects_negative_page_index() {
        let state = AppState::fake();
        let err = get_page(&state, Uuid::new_v4(), -1).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn cached_page_is_served_without_the_store() {
        let state = AppState::fake();
        let dream_id = Uuid::new_v4();
        let page = vec![test_comment(dream_id, "first"), test_comment(dream_id, "second")];

        cache::set_json(
            state.cache.as_ref(),
            &keys::comments(dream_id, 0),
            &page,
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        // The fake pool cannot serve queries, so a hit here proves the
        // cache path was taken.
        let served = get_page(&state, dream_id, 0).await.unwrap();
        assert_eq!(served.len(), 2);
        assert_eq!(served[0].text, "first");
    }
}
