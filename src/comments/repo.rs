use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::Comment;

impl Comment {
    pub async fn insert(db: &PgPool, comment: &Comment) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, dream_id, author_id, text, likes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(comment.id)
        .bind(comment.dream_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .bind(&comment.likes)
        .bind(comment.created_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// One page of comments in insertion order.
    pub async fn page(
        db: &PgPool,
        dream_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<Comment>> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, dream_id, author_id, text, likes, created_at
              FROM comments
             WHERE dream_id = $1
             ORDER BY created_at
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(dream_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }
}
