use std::time::Duration;

use async_trait::async_trait;

use crate::dreams::{Dream, DreamStatus};

/// Result of a generation run: the terminal status plus any produced image
/// references.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub status: DreamStatus,
    pub images: Vec<String>,
}

impl GenerationOutcome {
    pub fn failed() -> Self {
        Self {
            status: DreamStatus::Failed,
            images: Vec::new(),
        }
    }
}

/// Boundary to the actual image generation backend. The worker only cares
/// about the terminal classification and the image references.
#[async_trait]
pub trait DreamGenerator: Send + Sync {
    async fn generate(&self, dream: &Dream) -> anyhow::Result<GenerationOutcome>;
}

/// Stand-in generator: sleeps briefly and emits the three standard image
/// references (origin, thumb, square) for the requested dimensions.
#[derive(Default)]
pub struct StubGenerator;

#[async_trait]
impl DreamGenerator for StubGenerator {
    async fn generate(&self, dream: &Dream) -> anyhow::Result<GenerationOutcome> {
        tokio::time::sleep(Duration::from_millis(50)).await;

        let base = format!("{}_{}x{}", dream.id, dream.width, dream.height);
        Ok(GenerationOutcome {
            status: DreamStatus::Done,
            images: vec![
                format!("{base}_origin"),
                format!("{base}_thumb"),
                format!("{base}_square"),
            ],
        })
    }
}
