use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::Dream;

const DREAM_COLUMNS: &str = "id, prompt, steps, scale, width, height, seed, \
     author, author_id, status, images, likes, created_at, finished_at";

impl Dream {
    pub async fn insert(db: &PgPool, dream: &Dream) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dreams
                (id, prompt, steps, scale, width, height, seed,
                 author, author_id, status, images, likes, created_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(dream.id)
        .bind(&dream.prompt)
        .bind(dream.steps)
        .bind(dream.scale)
        .bind(dream.width)
        .bind(dream.height)
        .bind(dream.seed)
        .bind(&dream.author)
        .bind(dream.author_id)
        .bind(dream.status)
        .bind(&dream.images)
        .bind(&dream.likes)
        .bind(dream.created_at)
        .bind(dream.finished_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Persist the fields the lifecycle mutates.
    pub async fn update(db: &PgPool, dream: &Dream) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE dreams
               SET status = $2, images = $3, finished_at = $4
             WHERE id = $1
            "#,
        )
        .bind(dream.id)
        .bind(dream.status)
        .bind(&dream.images)
        .bind(dream.finished_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Dream>> {
        sqlx::query_as::<_, Dream>(&format!(
            r#"SELECT {DREAM_COLUMNS} FROM dreams WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }
}

// ---- Likes: idempotent set membership on the dream row ----

pub async fn add_like(db: &PgPool, dream_id: Uuid, user_id: Uuid) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE dreams
           SET likes = array_append(likes, $2)
         WHERE id = $1 AND NOT ($2 = ANY(likes))
        "#,
    )
    .bind(dream_id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn remove_like(db: &PgPool, dream_id: Uuid, user_id: Uuid) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE dreams
           SET likes = array_remove(likes, $2)
         WHERE id = $1
        "#,
    )
    .bind(dream_id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}
