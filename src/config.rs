use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// TTLs for the cache-aside entries. `dream_short` is the tolerable
/// staleness window used after like mutations instead of a full wipe.
#[derive(Debug, Clone)]
pub struct CacheTtlConfig {
    pub dream: Duration,
    pub dream_short: Duration,
    pub user: Duration,
    pub new_feed: Duration,
    pub comments: Duration,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Max entries returned by a single peek/consume.
    pub feed_limit: usize,
    /// Cap on a user's outbox; oldest entries are evicted past this.
    pub outbox_limit: usize,
    /// Rolling window: feed entries older than this many days are dropped.
    pub window_days: i64,
}

#[derive(Debug, Clone)]
pub struct CommentConfig {
    pub per_page: i64,
    pub max_len: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub jwt: JwtConfig,
    pub cache: CacheTtlConfig,
    pub feed: FeedConfig,
    pub comments: CommentConfig,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dreamfeed".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "dreamfeed-users".into()),
            ttl_minutes: env_i64("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_i64("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7),
        };

        let cache = CacheTtlConfig {
            dream: Duration::from_secs(env_u64("CACHE_DREAM_TTL_SECS", 3600)),
            dream_short: Duration::from_secs(env_u64("CACHE_DREAM_SHORT_TTL_SECS", 30)),
            user: Duration::from_secs(env_u64("CACHE_USER_TTL_SECS", 3600)),
            new_feed: Duration::from_secs(env_u64("CACHE_NEW_FEED_TTL_SECS", 60)),
            comments: Duration::from_secs(env_u64("CACHE_COMMENTS_TTL_SECS", 300)),
        };

        let feed = FeedConfig {
            feed_limit: env_u64("FEED_LIMIT", 16) as usize,
            outbox_limit: env_u64("OUTBOX_LIMIT", 24) as usize,
            window_days: env_i64("FEED_WINDOW_DAYS", 3),
        };

        let comments = CommentConfig {
            per_page: env_i64("COMMENTS_PER_PAGE", 10),
            max_len: env_u64("COMMENT_MAX_LEN", 512) as usize,
        };

        Ok(Self {
            database_url,
            redis_url,
            jwt,
            cache,
            feed,
            comments,
        })
    }
}
