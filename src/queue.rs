use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

/// Durable FIFO hand-off for dream-processing jobs. `dequeue` blocks up to
/// `timeout` and returns `Ok(None)` when nothing arrived; the empty case is
/// a retry trigger, not an error. Delivery is at-most-once: a popped job
/// that is never processed is lost.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, id: Uuid) -> anyhow::Result<()>;
    async fn dequeue(&self, timeout: Duration) -> anyhow::Result<Option<Uuid>>;
}

// ---- Redis implementation ----

/// Redis list with RPUSH/BLPOP. Holds its own connection so a blocking pop
/// never stalls cache traffic.
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    key: String,
}

impl RedisQueue {
    pub async fn connect(url: &str, key: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("parse redis url")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("connect to redis")?;
        Ok(Self {
            conn,
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, id: Uuid) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("RPUSH")
            .arg(&self.key)
            .arg(id.to_string())
            .query_async(&mut conn)
            .await
            .context("redis RPUSH")?;
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> anyhow::Result<Option<Uuid>> {
        let mut conn = self.conn.clone();
        // BLPOP returns nil on timeout, (key, value) otherwise.
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await
            .context("redis BLPOP")?;
        match popped {
            Some((_, raw)) => {
                let id = Uuid::parse_str(&raw)
                    .with_context(|| format!("malformed job id in queue: {raw}"))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }
}

// ---- In-memory implementation ----

/// Process-local queue with the same contract as [`RedisQueue`]. Used by
/// `AppState::fake()` and the test suite.
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<Uuid>>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, id: Uuid) -> anyhow::Result<()> {
        self.items.lock().await.push_back(id);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> anyhow::Result<Option<Uuid>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(id) = self.items.lock().await.pop_front() {
                return Ok(Some(id));
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }
}
