use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::DreamStatus;

/// Generation parameters submitted by the client. Author and lifecycle
/// fields are always assigned server-side.
#[derive(Debug, Deserialize)]
pub struct NewDreamRequest {
    pub prompt: String,
    pub steps: i32,
    pub scale: f32,
    pub width: i32,
    pub height: i32,
    pub seed: i64,
}

#[derive(Debug, Serialize)]
pub struct DreamCreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DreamStatusResponse {
    pub status: DreamStatus,
}
