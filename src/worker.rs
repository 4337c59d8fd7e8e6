use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dreams::{self, DreamStatus};
use crate::error::AppResult;
use crate::generator::DreamGenerator;
use crate::state::AppState;
use crate::users;

/// How long a single dequeue blocks before the loop re-checks shutdown.
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause after a queue failure before trying again.
const DEQUEUE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Consumes the dream queue and drives each dream through its lifecycle:
/// processing, generation, terminal status, outbox fan-out. A failed job is
/// logged and skipped; the loop never dies on a single job.
pub struct DreamWorker {
    state: AppState,
    generator: Arc<dyn DreamGenerator>,
    shutdown: watch::Receiver<bool>,
}

impl DreamWorker {
    pub fn new(
        state: AppState,
        generator: Arc<dyn DreamGenerator>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            state,
            generator,
            shutdown,
        }
    }

    pub async fn run(self) {
        info!("dream worker started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let dream_id = match self.state.queue.dequeue(DEQUEUE_TIMEOUT).await {
                Ok(Some(id)) => id,
                // Timeout: loop back around, re-checking shutdown.
                Ok(None) => continue,
                Err(err) => {
                    error!(error = %err, "dequeue failed");
                    tokio::time::sleep(DEQUEUE_RETRY_DELAY).await;
                    continue;
                }
            };

            if let Err(err) = self.process(dream_id).await {
                error!(error = %err, dream_id = %dream_id, "dream job failed, skipping");
            }
        }
        info!("dream worker stopped");
    }

    async fn process(&self, dream_id: Uuid) -> AppResult<()> {
        let mut dream = dreams::services::get_dream(&self.state, dream_id).await?;

        // Duplicate or replayed delivery: terminal dreams stay terminal.
        if dream.status.is_terminal() {
            warn!(dream_id = %dream.id, status = ?dream.status, "dream already finished, skipping");
            return Ok(());
        }

        if dream.status.can_transition_to(DreamStatus::Processing) {
            dream.status = DreamStatus::Processing;
            dreams::services::update_dream(&self.state, &dream, false).await?;
        }

        let outcome = match self.generator.generate(&dream).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, dream_id = %dream.id, "generation failed");
                crate::generator::GenerationOutcome::failed()
            }
        };

        dream.status = outcome.status;
        dream.images = outcome.images;
        dream.finished_at = Some(OffsetDateTime::now_utc());
        dreams::services::update_dream(&self.state, &dream, false).await?;

        users::services::push_feed(&self.state, dream.author_id, dream.id).await?;

        info!(dream_id = %dream.id, status = ?dream.status, "dream finished");
        Ok(())
    }
}
