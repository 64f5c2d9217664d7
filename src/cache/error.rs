//! Cache error types.

use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::vectordb::VectorIndexError;

/// Errors from exact-cache backends.
///
/// The [`ExactCache`](super::ExactCache) wrapper absorbs every variant into
/// a miss or a failed put; nothing here ever reaches a client.
#[derive(Debug, Error)]
pub enum ExactCacheError {
    /// Could not reach the backend.
    #[error("exact cache backend unreachable: {message}")]
    Unreachable {
        /// Error message.
        message: String,
    },

    /// A get/put command failed.
    #[error("exact cache operation failed: {message}")]
    OperationFailed {
        /// Error message.
        message: String,
    },
}

impl From<redis::RedisError> for ExactCacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            ExactCacheError::Unreachable {
                message: err.to_string(),
            }
        } else {
            ExactCacheError::OperationFailed {
                message: err.to_string(),
            }
        }
    }
}

/// Errors from the semantic cache.
///
/// Callers on the request path swallow these (log + treat as miss/no-op);
/// they are surfaced as `Result` so startup code and tests can observe them.
#[derive(Debug, Error)]
pub enum SemanticCacheError {
    /// Embedding the text failed.
    #[error("embedding failed: {source}")]
    Embedding {
        /// Underlying failure.
        #[from]
        source: EmbeddingError,
    },

    /// The vector index failed.
    #[error("vector index failed: {source}")]
    Index {
        /// Underlying failure.
        #[from]
        source: VectorIndexError,
    },

    /// Configuration is invalid.
    #[error("invalid semantic cache configuration: {reason}")]
    InvalidConfig {
        /// Error message.
        reason: String,
    },
}
