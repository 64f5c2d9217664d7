//! Key-store error types.

use thiserror::Error;

/// Errors returned by key-store backends.
///
/// The authenticator treats every variant as a failed lookup (fail-closed):
/// the caller sees the uniform 401 and the error is only logged.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Could not open the backing database.
    #[error("failed to open key store at '{url}': {source}")]
    Connect {
        /// Connection string (no secrets; SQLite paths only).
        url: String,
        /// Underlying failure.
        #[source]
        source: sqlx::Error,
    },

    /// Schema creation failed.
    #[error("failed to prepare key store schema: {source}")]
    Schema {
        /// Underlying failure.
        #[source]
        source: sqlx::Error,
    },

    /// A query failed.
    #[error("key store query failed: {source}")]
    Query {
        /// Underlying failure.
        #[source]
        source: sqlx::Error,
    },
}
