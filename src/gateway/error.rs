//! Pipeline error surface.
//!
//! Primary-path failures (validation, resolution, upstream) surface here;
//! auxiliary failures (caches, scrubber, metrics) are absorbed before they
//! can reach this type. Every body is `{"detail": ...}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::providers::{ProviderError, RegistryError};

/// Errors that terminate a request with a client-visible status.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Body failed to parse or validate as a chat request.
    #[error("{0}")]
    InvalidRequest(String),

    /// No configured provider serves the model, or its credential is
    /// missing. Surfaced as 400 so operator mistakes are visible to the
    /// caller instead of masked as server errors.
    #[error("{0}")]
    Resolution(#[from] RegistryError),

    /// Upstream HTTP error; status and body are relayed verbatim.
    #[error("upstream returned status {status}")]
    Upstream {
        /// Upstream status code.
        status: u16,
        /// Upstream body.
        body: serde_json::Value,
    },

    /// Upstream never answered (network, DNS, timeout) or answered with an
    /// unusable body.
    #[error("{0}")]
    BadUpstream(String),

    /// Anything else.
    #[error("Internal server error")]
    Internal(String),
}

impl From<ProviderError> for GatewayError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Upstream { status, body } => GatewayError::Upstream { status, body },
            ProviderError::Transport { message } => GatewayError::BadUpstream(message),
            ProviderError::InvalidResponse { reason } => GatewayError::BadUpstream(reason),
        }
    }
}

impl GatewayError {
    /// Status code this error terminates with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) | GatewayError::Resolution(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::BadUpstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let detail = match self {
            // The upstream body is relayed as-is inside the detail field.
            GatewayError::Upstream { body, .. } => body,
            GatewayError::Internal(reason) => {
                tracing::error!(reason = %reason, "internal error");
                serde_json::Value::String("Internal server error".to_string())
            }
            other => serde_json::Value::String(other.to_string()),
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}
