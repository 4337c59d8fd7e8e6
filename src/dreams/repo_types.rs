use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Processing state of a dream. Transitions are monotonic within one run:
/// pending → processing → {done | failed | nsfw}. Terminal states never
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dream_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DreamStatus {
    Pending,
    Processing,
    Done,
    Failed,
    Nsfw,
}

impl DreamStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Nsfw)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Done)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Nsfw)
        )
    }
}

/// A generation request and its results. Generation parameters are opaque
/// to everything but the generator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Dream {
    pub id: Uuid,
    pub prompt: String,
    pub steps: i32,
    pub scale: f32,
    pub width: i32,
    pub height: i32,
    pub seed: i64,
    pub author: String,
    pub author_id: Uuid,
    pub status: DreamStatus,
    pub images: Vec<String>,
    pub likes: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
}
