use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{FeedEntry, User};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, following, followers, likes, outbox, inbox, created_at, updated_at";

impl User {
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE username = $1"#
        ))
        .bind(username)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE email = $1"#
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }
}

// ---- Social graph: two independent sets, each update idempotent ----

pub async fn add_following(db: &PgPool, user_id: Uuid, target: Uuid) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
           SET following = array_append(following, $2), updated_at = now()
         WHERE id = $1 AND NOT ($2 = ANY(following))
        "#,
    )
    .bind(user_id)
    .bind(target)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn add_follower(db: &PgPool, user_id: Uuid, follower: Uuid) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
           SET followers = array_append(followers, $2), updated_at = now()
         WHERE id = $1 AND NOT ($2 = ANY(followers))
        "#,
    )
    .bind(user_id)
    .bind(follower)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn remove_following(db: &PgPool, user_id: Uuid, target: Uuid) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
           SET following = array_remove(following, $2), updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(target)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn remove_follower(db: &PgPool, user_id: Uuid, follower: Uuid) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
           SET followers = array_remove(followers, $2), updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(follower)
    .execute(db)
    .await?;
    Ok(())
}

// ---- Outbox ----

/// Bounded head insert: the new entry goes first and everything past
/// `limit` is evicted, oldest last.
pub(crate) fn cap_prepend(
    entry: FeedEntry,
    mut outbox: Vec<FeedEntry>,
    limit: usize,
) -> Vec<FeedEntry> {
    outbox.insert(0, entry);
    outbox.truncate(limit);
    outbox
}

/// Prepend `entry` to the user's outbox, applying the cap. The row lock
/// keeps concurrent completions from losing each other's entries. A
/// missing user is a no-op.
pub async fn push_outbox(
    db: &PgPool,
    user_id: Uuid,
    entry: &FeedEntry,
    limit: usize,
) -> sqlx::Result<()> {
    let mut tx = db.begin().await?;

    let outbox: Option<Json<Vec<FeedEntry>>> =
        sqlx::query_scalar(r#"SELECT outbox FROM users WHERE id = $1 FOR UPDATE"#)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(Json(outbox)) = outbox else {
        return Ok(());
    };

    sqlx::query(r#"UPDATE users SET outbox = $2, updated_at = now() WHERE id = $1"#)
        .bind(user_id)
        .bind(Json(cap_prepend(entry.clone(), outbox, limit)))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn entry(minutes_ago: i64) -> FeedEntry {
        FeedEntry {
            dream: Uuid::new_v4(),
            generated: OffsetDateTime::now_utc() - time::Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn new_entries_land_at_the_head() {
        let older = entry(10);
        let newest = entry(0);

        let capped = cap_prepend(newest.clone(), vec![older.clone()], 24);
        assert_eq!(capped, vec![newest, older]);
    }

    #[test]
    fn outbox_never_exceeds_the_cap_and_evicts_oldest_first() {
        let limit = 3;
        let mut outbox = Vec::new();
        for i in 0..5i64 {
            outbox = cap_prepend(entry(5 - i), outbox, limit);
            assert!(outbox.len() <= limit);
        }

        assert_eq!(outbox.len(), limit);
        // Most-recent-first order survives every eviction.
        assert!(outbox
            .windows(2)
            .all(|pair| pair[0].generated >= pair[1].generated));
    }

    #[test]
    fn cap_of_zero_keeps_nothing() {
        assert!(cap_prepend(entry(0), Vec::new(), 0).is_empty());
    }
}
