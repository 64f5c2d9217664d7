//! Vector index backends for the semantic cache.
//!
//! The production backend is Qdrant with cosine distance, so search scores
//! are already similarities (higher is closer) and compare directly against
//! the semantic-cache threshold.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;

pub use client::{QdrantIndex, VectorIndex};
pub use error::VectorIndexError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockVectorIndex;
pub use model::{SearchHit, SemanticPoint};

/// Collection holding the semantic-cache entries.
pub const SEMANTIC_COLLECTION_NAME: &str = "semantic_cache";
