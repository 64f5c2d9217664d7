//! Provider and registry error types.

use thiserror::Error;

/// Errors from an upstream adapter call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The upstream answered with an HTTP error. Status and body are kept
    /// verbatim so the gateway can relay them to the caller.
    #[error("upstream returned status {status}")]
    Upstream {
        /// Upstream HTTP status.
        status: u16,
        /// Upstream response body (JSON when parseable, wrapped text otherwise).
        body: serde_json::Value,
    },

    /// The request never completed (connect, DNS, timeout, ...).
    #[error("upstream request failed: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The upstream replied 2xx with a body that does not fit its schema.
    #[error("unusable upstream response: {reason}")]
    InvalidResponse {
        /// Error message.
        reason: String,
    },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport {
            message: err.to_string(),
        }
    }
}

/// Errors from model → adapter resolution.
///
/// Both variants are configuration faults visible to the caller as 400s:
/// a silent 500 would hide an operator mistake behind a server error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No configured provider serves the model.
    #[error("No provider found for model: {model}")]
    NoProvider {
        /// The unresolvable model id.
        model: String,
    },

    /// The provider's credential variable is absent from the environment.
    #[error("Environment variable {name} not set.")]
    MissingCredential {
        /// Variable name from the provider config.
        name: String,
    },
}
