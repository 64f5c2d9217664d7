//! Upstream provider adapters.
//!
//! Each adapter translates the canonical request into one upstream's wire
//! format and the upstream's reply back into a canonical [`ChatResponse`].
//! Adapters are stateless apart from their credential and the shared HTTP
//! client, so a resolved adapter is safe to use from any task.

pub mod anthropic;
pub mod error;
pub mod google;
pub mod openai;
pub mod registry;

pub use anthropic::AnthropicAdapter;
pub use error::{ProviderError, RegistryError};
pub use google::GoogleAdapter;
pub use openai::OpenAiAdapter;
pub use registry::{DEFAULT_UPSTREAM_TIMEOUT, ProviderRegistry};

use crate::api::{ChatRequest, ChatResponse};

/// The tagged adapter family. One capability: [`invoke`](Adapter::invoke).
#[derive(Clone, Debug)]
pub enum Adapter {
    /// OpenAI-shaped upstream (pass-through).
    OpenAi(OpenAiAdapter),
    /// Google Gemini.
    Google(GoogleAdapter),
    /// Anthropic Claude.
    Anthropic(AnthropicAdapter),
}

impl Adapter {
    /// Sends the request upstream and returns the canonical response.
    pub async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        match self {
            Adapter::OpenAi(adapter) => adapter.invoke(request).await,
            Adapter::Google(adapter) => adapter.invoke(request).await,
            Adapter::Anthropic(adapter) => adapter.invoke(request).await,
        }
    }

    /// Name of the adapter family, for logs.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Adapter::OpenAi(_) => "openai",
            Adapter::Google(_) => "google",
            Adapter::Anthropic(_) => "anthropic",
        }
    }
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Completion id in the OpenAI shape, derived from the creation time.
pub(crate) fn completion_id(unix_seconds: u64) -> String {
    format!("chatcmpl-{unix_seconds}")
}

/// Whitespace-split word count, the token estimate for upstreams that do
/// not report usage.
pub(crate) fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Builds the propagated error for a non-2xx upstream reply.
///
/// The body is kept as JSON when it parses, and wrapped in a `detail`
/// object otherwise, so the gateway always relays valid JSON.
pub(crate) fn upstream_error(status: u16, body_text: Option<String>) -> ProviderError {
    let body = match body_text {
        Some(text) => serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::json!({ "detail": text })),
        None => serde_json::json!({ "detail": "upstream returned no body" }),
    };

    ProviderError::Upstream { status, body }
}
