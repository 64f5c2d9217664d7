//! Composition root for the request pipeline.

use std::sync::Arc;

use crate::auth::KeyStore;
use crate::cache::{ExactCache, ExactCacheBackend, SemanticCache};
use crate::dlp::PiiDetector;
use crate::providers::ProviderRegistry;
use crate::ratelimit::RateLimiter;
use crate::vectordb::VectorIndex;

/// Everything the pipeline needs, constructed once at startup and passed
/// explicitly. Tests build the same structure over mock backends.
pub struct AppState<C, V, K>
where
    C: ExactCacheBackend + 'static,
    V: VectorIndex + 'static,
    K: KeyStore + 'static,
{
    /// Fingerprint-keyed response cache.
    pub exact_cache: Arc<ExactCache<C>>,

    /// Embedding-keyed fingerprint cache.
    pub semantic_cache: Arc<SemanticCache<V>>,

    /// API-key store, read by the authenticator middleware.
    pub key_store: Arc<K>,

    /// Model → adapter resolution.
    pub registry: Arc<ProviderRegistry>,

    /// PII analyzer behind the scrubber.
    pub detector: Arc<dyn PiiDetector>,

    /// Per-principal admission control.
    pub limiter: Arc<RateLimiter>,
}

impl<C, V, K> Clone for AppState<C, V, K>
where
    C: ExactCacheBackend + 'static,
    V: VectorIndex + 'static,
    K: KeyStore + 'static,
{
    fn clone(&self) -> Self {
        Self {
            exact_cache: self.exact_cache.clone(),
            semantic_cache: self.semantic_cache.clone(),
            key_store: self.key_store.clone(),
            registry: self.registry.clone(),
            detector: self.detector.clone(),
            limiter: self.limiter.clone(),
        }
    }
}

impl<C, V, K> AppState<C, V, K>
where
    C: ExactCacheBackend + 'static,
    V: VectorIndex + 'static,
    K: KeyStore + 'static,
{
    /// Assembles a state from already-constructed parts.
    pub fn new(
        exact_cache: ExactCache<C>,
        semantic_cache: SemanticCache<V>,
        key_store: Arc<K>,
        registry: ProviderRegistry,
        detector: Arc<dyn PiiDetector>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            exact_cache: Arc::new(exact_cache),
            semantic_cache: Arc::new(semantic_cache),
            key_store,
            registry: Arc::new(registry),
            detector,
            limiter: Arc::new(limiter),
        }
    }
}

/// State over fully in-process backends.
#[cfg(any(test, feature = "mock"))]
pub type MockAppState = AppState<
    crate::cache::MemoryExactCache,
    crate::vectordb::MockVectorIndex,
    crate::auth::MockKeyStore,
>;

#[cfg(any(test, feature = "mock"))]
impl MockAppState {
    /// Builds a state over mock backends: in-process exact cache, stub
    /// embedder over an in-memory index, empty key store, regex detector,
    /// and the default 10/minute limiter.
    pub async fn new_mock(registry: ProviderRegistry) -> Self {
        use crate::cache::{DEFAULT_CACHE_TTL, MemoryExactCache, SemanticCacheConfig};

        let exact_cache = ExactCache::new(MemoryExactCache::new(), DEFAULT_CACHE_TTL);
        let semantic_cache = SemanticCache::new_mock(SemanticCacheConfig::default())
            .await
            .expect("mock semantic cache");
        let detector: Arc<dyn PiiDetector> =
            Arc::new(crate::dlp::RegexDetector::new().expect("built-in patterns compile"));

        Self::new(
            exact_cache,
            semantic_cache,
            Arc::new(crate::auth::MockKeyStore::new()),
            registry,
            detector,
            RateLimiter::new(crate::ratelimit::RateLimitPolicy::default()),
        )
    }
}
