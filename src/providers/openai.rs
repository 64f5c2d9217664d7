//! OpenAI adapter (pass-through).

use serde::Serialize;
use tracing::{debug, instrument};

use super::error::ProviderError;
use super::upstream_error;
use crate::api::{ChatMessage, ChatRequest, ChatResponse};

/// Adapter for OpenAI-shaped upstreams.
///
/// The canonical types already match the upstream wire format, so this
/// adapter only attaches credentials and strips unset fields.
#[derive(Clone, Debug)]
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// Outbound body; unset optional fields are omitted rather than sent as null.
#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl OpenAiAdapter {
    /// Production endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";

    /// Creates an adapter against the production endpoint.
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, Self::DEFAULT_BASE_URL)
    }

    /// Creates an adapter against a custom endpoint (tests, proxies).
    pub fn with_base_url(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Forwards the request and returns the (already canonical) response.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(status.as_u16(), response.text().await.ok()));
        }

        debug!(status = status.as_u16(), "OpenAI upstream responded");
        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                reason: e.to_string(),
            })
    }
}
