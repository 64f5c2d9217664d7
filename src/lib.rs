//! # Switchboard
//!
//! OpenAI-compatible LLM gateway with tiered response caching.
//!
//! Switchboard sits between clients speaking the OpenAI chat-completion
//! protocol and the upstream providers that actually own the models.
//!
//! ```text
//! Request → Auth → Rate limit → PII scrub → Exact cache → Semantic cache → Provider
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchboard::Settings;
//!
//! # fn run() -> anyhow::Result<()> {
//! let settings = Settings::from_env()?;
//! println!("Listening on {}", settings.socket_addr());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `cpu` | CPU-only inference (docs.rs default) |
//! | `metal` | Apple Silicon GPU acceleration |
//! | `cuda` | NVIDIA GPU acceleration |
//! | `mock` | Mock backends for tests/examples |
//!
//! ## Modules
//!
//! - [`api`] - Canonical chat request/response types
//! - [`auth`] - API-key authentication and the key store
//! - [`cache`] - Exact (fingerprint) and semantic (embedding) caches
//! - [`config`] - Provider routing table + environment settings
//! - [`dlp`] - PII detection and redaction
//! - [`embedding`] - Sentence embedding model
//! - [`gateway`] - HTTP surface and the request pipeline
//! - [`hashing`] - Fingerprints and key digests
//! - [`metrics`] - Prometheus series
//! - [`providers`] - Upstream adapters and the model registry
//! - [`ratelimit`] - Per-principal token buckets
//! - [`vectordb`] - Qdrant-backed vector index

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod dlp;
pub mod embedding;
pub mod gateway;
pub mod hashing;
pub mod metrics;
pub mod providers;
pub mod ratelimit;
pub mod vectordb;

pub use api::{ChatMessage, ChatRequest, ChatResponse, Choice, Role, Usage};
#[cfg(any(test, feature = "mock"))]
pub use auth::MockKeyStore;
pub use auth::{ApiKeyRecord, KeyStore, KeyStoreError, SqliteKeyStore, generate_api_key};
pub use cache::{
    CACHE_STATUS_HEADER, CacheStatus, DEFAULT_CACHE_TTL, ExactCache, ExactCacheBackend,
    ExactCacheError, MemoryExactCache, RedisExactCache, SemanticCache, SemanticCacheConfig,
    SemanticCacheError,
};
pub use config::{ConfigError, GatewayConfig, ProviderConfig, Settings};
pub use dlp::{PiiDetector, PiiKind, PiiSpan, RegexDetector, scrub_request, scrub_text};
pub use embedding::{EMBEDDING_DIM, EmbedderConfig, EmbeddingError, TextEmbedder};
pub use hashing::{fingerprint, fingerprint_to_point_id, hash_api_key};
pub use providers::{Adapter, ProviderError, ProviderRegistry, RegistryError};
pub use ratelimit::{RateLimitPolicy, RateLimiter};
#[cfg(any(test, feature = "mock"))]
pub use vectordb::MockVectorIndex;
pub use vectordb::{
    QdrantIndex, SEMANTIC_COLLECTION_NAME, SearchHit, SemanticPoint, VectorIndex, VectorIndexError,
};
