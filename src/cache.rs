use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// TTL key-value cache fronting the durable store, plus the set primitives
/// used for the per-user seen-set. A missing key is `Ok(None)`, never an
/// error; only infrastructure failures surface as `Err`.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> anyhow::Result<()>;
    /// Force immediate expiry. Deleting an absent key is a no-op.
    async fn invalidate(&self, key: &str) -> anyhow::Result<()>;
    /// Set the remaining lifetime to `min(current, ttl)`. Never extends.
    async fn shorten_ttl(&self, key: &str, ttl: Duration) -> anyhow::Result<()>;

    async fn set_add(&self, key: &str, members: &[String]) -> anyhow::Result<u64>;
    async fn set_remove(&self, key: &str, members: &[String]) -> anyhow::Result<u64>;
    async fn set_pop(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Batched membership check; an absent set reads as all-false.
    async fn set_contains(&self, key: &str, members: &[String]) -> anyhow::Result<Vec<bool>>;
}

/// Cache key builders. Kept in one place so readers and invalidators
/// cannot drift apart.
pub mod keys {
    use uuid::Uuid;

    pub fn dream(id: Uuid) -> String {
        format!("d:{id}")
    }

    pub fn user(id: Uuid) -> String {
        format!("u:{id}")
    }

    pub fn new_feed(user_id: Uuid) -> String {
        format!("u:{user_id}:feed:new")
    }

    pub fn seen(user_id: Uuid) -> String {
        format!("u:{user_id}:seen")
    }

    pub fn comments(dream_id: Uuid, page: i64) -> String {
        format!("d:{dream_id}:comments:{page}")
    }
}

/// Cache-aside read half: deserialize a cached JSON value if present.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn Cache,
    key: &str,
) -> anyhow::Result<Option<T>> {
    match cache.get(key).await? {
        Some(raw) => {
            let value = serde_json::from_slice(&raw)
                .with_context(|| format!("deserialize cached value at {key}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Cache-aside write half: serialize and store with a TTL.
pub async fn set_json<T: Serialize>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> anyhow::Result<()> {
    let raw = serde_json::to_vec(value).with_context(|| format!("serialize value for {key}"))?;
    cache.set(key, &raw, ttl).await
}

// ---- Redis implementation ----

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("parse redis url")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("connect to redis")?;
        Ok(Self { conn })
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .context("redis GET")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .context("redis SET")?;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .context("redis DEL")?;
        Ok(())
    }

    async fn shorten_ttl(&self, key: &str, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        // EXPIRE ... LT only lowers the remaining lifetime.
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .arg("LT")
            .query_async(&mut conn)
            .await
            .context("redis EXPIRE LT")?;
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> anyhow::Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let added: u64 = redis::cmd("SADD")
            .arg(key)
            .arg(members)
            .query_async(&mut conn)
            .await
            .context("redis SADD")?;
        Ok(added)
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> anyhow::Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("SREM")
            .arg(key)
            .arg(members)
            .query_async(&mut conn)
            .await
            .context("redis SREM")?;
        Ok(removed)
    }

    async fn set_pop(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let member: Option<String> = redis::cmd("SPOP")
            .arg(key)
            .query_async(&mut conn)
            .await
            .context("redis SPOP")?;
        Ok(member)
    }

    async fn set_contains(&self, key: &str, members: &[String]) -> anyhow::Result<Vec<bool>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let flags: Vec<bool> = redis::cmd("SMISMEMBER")
            .arg(key)
            .arg(members)
            .query_async(&mut conn)
            .await
            .context("redis SMISMEMBER")?;
        Ok(flags)
    }
}

// ---- In-memory implementation ----

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, (Vec<u8>, Instant)>,
    sets: HashMap<String, HashSet<String>>,
}

/// Process-local cache with the same contract as [`RedisCache`]. Used by
/// `AppState::fake()` and the test suite.
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<MemoryInner>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock().await;
        match inner.values.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                inner.values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .values
            .insert(key.to_string(), (value.to_vec(), Instant::now() + ttl));
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.values.remove(key);
        Ok(())
    }

    async fn shorten_ttl(&self, key: &str, ttl: Duration) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some((_, expires_at)) = inner.values.get_mut(key) {
            let candidate = Instant::now() + ttl;
            if candidate < *expires_at {
                *expires_at = candidate;
            }
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        let set = inner.sets.entry(key.to_string()).or_default();
        let mut added = 0;
        for member in members {
            if set.insert(member.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        let Some(set) = inner.sets.get_mut(key) else {
            return Ok(0);
        };
        let mut removed = 0;
        for member in members {
            if set.remove(member) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn set_pop(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        let Some(set) = inner.sets.get_mut(key) else {
            return Ok(None);
        };
        let member = set.iter().next().cloned();
        if let Some(member) = &member {
            set.remove(member);
        }
        Ok(member)
    }

    async fn set_contains(&self, key: &str, members: &[String]) -> anyhow::Result<Vec<bool>> {
        let inner = self.inner.lock().await;
        match inner.sets.get(key) {
            Some(set) => Ok(members.iter().map(|m| set.contains(m)).collect()),
            None => Ok(vec![false; members.len()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_is_none_not_error() {
        let cache = MemoryCache::new();
        assert!(cache.get("absent").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn set_get_and_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"v", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_forces_miss() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"v", Duration::from_secs(60))
            .await
            .unwrap();
        cache.invalidate("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shorten_ttl_only_shortens() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"v", Duration::from_secs(100))
            .await
            .unwrap();

        // Shorten to 5s: gone after 6s.
        cache.shorten_ttl("k", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get("k").await.unwrap().is_none());

        // A longer "shorten" must not extend the remaining lifetime.
        cache
            .set("k", b"v", Duration::from_secs(5))
            .await
            .unwrap();
        cache
            .shorten_ttl("k", Duration::from_secs(500))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_add_is_idempotent() {
        let cache = MemoryCache::new();
        let members = vec!["a".to_string(), "b".to_string()];
        assert_eq!(cache.set_add("s", &members).await.unwrap(), 2);
        assert_eq!(cache.set_add("s", &members).await.unwrap(), 0);
        assert_eq!(
            cache.set_contains("s", &members).await.unwrap(),
            vec![true, true]
        );
    }

    #[tokio::test]
    async fn set_remove_absent_member_is_noop() {
        let cache = MemoryCache::new();
        cache.set_add("s", &["a".to_string()]).await.unwrap();
        assert_eq!(cache.set_remove("s", &["z".to_string()]).await.unwrap(), 0);
        assert_eq!(
            cache.set_contains("s", &["a".to_string()]).await.unwrap(),
            vec![true]
        );
    }

    #[tokio::test]
    async fn membership_on_missing_set_is_all_false() {
        let cache = MemoryCache::new();
        let members = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            cache.set_contains("missing", &members).await.unwrap(),
            vec![false, false]
        );
    }

    #[tokio::test]
    async fn set_pop_evicts_one_member() {
        let cache = MemoryCache::new();
        cache.set_add("s", &["only".to_string()]).await.unwrap();
        assert_eq!(cache.set_pop("s").await.unwrap(), Some("only".to_string()));
        assert_eq!(cache.set_pop("s").await.unwrap(), None);
    }

    #[tokio::test]
    async fn json_helpers_roundtrip() {
        let cache = MemoryCache::new();
        let value = vec![1u32, 2, 3];
        set_json(&cache, "k", &value, Duration::from_secs(10))
            .await
            .unwrap();
        let loaded: Option<Vec<u32>> = get_json(&cache, "k").await.unwrap();
        assert_eq!(loaded, Some(value));
    }
}
