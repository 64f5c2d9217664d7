//! Exact cache: fingerprint → serialized response, TTL-bounded.

use std::future::Future;
use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, warn};

use super::error::ExactCacheError;
use crate::api::ChatResponse;

/// Default entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// String → string storage with per-entry TTL.
pub trait ExactCacheBackend: Send + Sync {
    /// Fetches a value; `None` when absent or expired.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, ExactCacheError>> + Send;

    /// Stores a value with a write TTL.
    fn put(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), ExactCacheError>> + Send;
}

/// Redis-backed exact cache.
#[derive(Clone)]
pub struct RedisExactCache {
    manager: redis::aio::ConnectionManager,
}

impl RedisExactCache {
    /// Connects to Redis at `url` (e.g. `redis://redis:6379`).
    ///
    /// The connection manager reconnects on its own, so a Redis restart
    /// shows up as a window of cache misses rather than an outage.
    pub async fn connect(url: &str) -> Result<Self, ExactCacheError> {
        let client = redis::Client::open(url).map_err(ExactCacheError::from)?;
        let manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(ExactCacheError::from)?;
        Ok(Self { manager })
    }
}

impl ExactCacheBackend for RedisExactCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ExactCacheError> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ExactCacheError> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }
}

/// In-process exact cache with per-entry expiry (tests, single-node runs).
pub struct MemoryExactCache {
    entries: moka::sync::Cache<String, (String, Duration)>,
}

struct PerEntryTtl;

impl moka::Expiry<String, (String, Duration)> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(String, Duration),
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

impl MemoryExactCache {
    const DEFAULT_CAPACITY: u64 = 10_000;

    /// Creates a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a cache with a max entry capacity (LRU eviction).
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: moka::sync::Cache::builder()
                .max_capacity(capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Number of live entries (after pending maintenance).
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Returns `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryExactCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExactCacheBackend for MemoryExactCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ExactCacheError> {
        Ok(self.entries.get(key).map(|(value, _ttl)| value))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ExactCacheError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }
}

/// Response-level wrapper over a backend.
///
/// Serializes [`ChatResponse`] as sorted-key JSON and absorbs every backend
/// or decode failure: `get` degrades to a miss, `put` to `false`. The
/// request path never sees a cache error.
pub struct ExactCache<B: ExactCacheBackend> {
    backend: B,
    default_ttl: Duration,
}

impl<B: ExactCacheBackend> ExactCache<B> {
    /// Wraps a backend with the given default TTL.
    pub fn new(backend: B, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the default TTL.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Looks up a fingerprint. Backend errors and undecodable entries are
    /// logged and reported as misses.
    pub async fn get(&self, fingerprint: &str) -> Option<ChatResponse> {
        let raw = match self.backend.get(fingerprint).await {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(error = %error, "exact cache get failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(response) => Some(response),
            Err(error) => {
                warn!(error = %error, "undecodable exact cache entry; treating as miss");
                None
            }
        }
    }

    /// Stores a response under a fingerprint with the default TTL.
    /// Returns whether the write succeeded; failures are logged only.
    pub async fn put(&self, fingerprint: &str, response: &ChatResponse) -> bool {
        self.put_with_ttl(fingerprint, response, self.default_ttl)
            .await
    }

    /// Stores a response with an explicit TTL.
    pub async fn put_with_ttl(
        &self,
        fingerprint: &str,
        response: &ChatResponse,
        ttl: Duration,
    ) -> bool {
        let serialized = match serde_json::to_value(response) {
            Ok(value) => value.to_string(),
            Err(error) => {
                warn!(error = %error, "failed to serialize response for caching");
                return false;
            }
        };

        match self.backend.put(fingerprint, &serialized, ttl).await {
            Ok(()) => {
                debug!(fingerprint, ttl_secs = ttl.as_secs(), "cached response");
                true
            }
            Err(error) => {
                warn!(error = %error, "exact cache put failed");
                false
            }
        }
    }
}
