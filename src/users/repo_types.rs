use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Pointer from a user's outbox to a completed dream. Never mutated after
/// creation; it ages out only when the outbox cap evicts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub dream: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub generated: OffsetDateTime,
}

/// User record in the database. `following`/`followers` are maintained as
/// two independent sets; `outbox` is bounded most-recent-first; `likes`
/// (liked dream ids) and `inbox` are reserved and unused.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub following: Vec<Uuid>,
    pub followers: Vec<Uuid>,
    pub likes: Vec<Uuid>,
    pub outbox: Json<Vec<FeedEntry>>,
    pub inbox: Json<Vec<FeedEntry>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
