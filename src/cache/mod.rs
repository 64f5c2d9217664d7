//! Two-level response cache.
//!
//! - [`exact`]: fingerprint → serialized response, TTL-bounded (Redis or
//!   in-process).
//! - [`semantic`]: embedding of the last user utterance → fingerprint, no
//!   TTL, confirmed against the exact layer before use.
//!
//! Both layers are auxiliary: every failure degrades to a miss or a skipped
//! write, never to a failed request.

pub mod error;
pub mod exact;
pub mod semantic;

pub use error::{ExactCacheError, SemanticCacheError};
pub use exact::{
    DEFAULT_CACHE_TTL, ExactCache, ExactCacheBackend, MemoryExactCache, RedisExactCache,
};
pub use semantic::{SemanticCache, SemanticCacheConfig, SemanticCacheStats};

/// Response header reporting which cache layer answered.
pub const CACHE_STATUS_HEADER: &str = "X-Cache-Status";

/// Which layer satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Fingerprint matched in the exact cache.
    HitExact,
    /// Semantic neighbor found and confirmed in the exact cache.
    HitSemantic,
    /// Both layers missed; the provider was called.
    Miss,
}

impl CacheStatus {
    /// Header value for this status.
    pub fn as_header_value(&self) -> &'static str {
        match self {
            CacheStatus::HitExact => "HIT_EXACT",
            CacheStatus::HitSemantic => "HIT_SEMANTIC",
            CacheStatus::Miss => "MISS",
        }
    }

    /// Returns `true` for either hit variant.
    pub fn is_hit(&self) -> bool {
        !matches!(self, CacheStatus::Miss)
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_header_value())
    }
}
