//! Anthropic Claude adapter.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::ProviderError;
use super::{completion_id, unix_timestamp, upstream_error};
use crate::api::{ChatRequest, ChatResponse, Usage};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.7;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Adapter for the Anthropic Messages API.
///
/// Unlike Gemini, the upstream reports real token counts, which are used
/// as-is. `max_tokens` is mandatory upstream, so the default always applies
/// when the caller omitted it.
#[derive(Clone, Debug)]
pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<WireContentBlock>,
    stop_reason: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicAdapter {
    /// Production endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";

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

    /// Calls the Messages API and reshapes the reply into canonical form.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = WireRequest {
            model: &request.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(status.as_u16(), response.text().await.ok()));
        }

        let wire: WireResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        let text = wire
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .unwrap_or_default();

        let usage = wire
            .usage
            .map(|u| Usage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Anthropic upstream responded"
        );

        let now = unix_timestamp();
        Ok(ChatResponse::single(
            completion_id(now),
            now,
            &request.model,
            text,
            wire.stop_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatMessage, Role};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(max_tokens: Option<u32>, temperature: Option<f64>) -> ChatRequest {
        ChatRequest {
            model: "claude-sonnet-4-5".to_string(),
            messages: vec![ChatMessage::new(Role::User, "Hi")],
            temperature,
            max_tokens,
        }
    }

    fn claude_reply() -> serde_json::Value {
        serde_json::json!({
            "id": "msg_abc",
            "content": [{"type": "text", "text": "Hello!"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 7}
        })
    }

    #[tokio::test]
    async fn test_translates_request_and_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "a-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-sonnet-4-5",
                "max_tokens": 100,
                "temperature": 0.2,
                "messages": [{"role": "user", "content": "Hi"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(claude_reply()))
            .expect(1)
            .mount(&server)
            .await;

        let adapter =
            AnthropicAdapter::with_base_url(reqwest::Client::new(), "a-key", server.uri());
        let response = adapter
            .invoke(&request(Some(100), Some(0.2)))
            .await
            .unwrap();

        assert_eq!(response.content(), Some("Hello!"));
        assert_eq!(response.choices[0].finish_reason, "end_turn");
        assert_eq!(response.usage, Usage::new(12, 7));
        assert!(response.id.starts_with("chatcmpl-"));
    }

    #[tokio::test]
    async fn test_applies_upstream_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "max_tokens": 4096,
                "temperature": 0.7,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(claude_reply()))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::with_base_url(reqwest::Client::new(), "a", server.uri());
        adapter.invoke(&request(None, None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_stop_reason_defaults_to_stop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "Hi"}],
                "usage": {"input_tokens": 1, "output_tokens": 1}
            })))
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::with_base_url(reqwest::Client::new(), "a", server.uri());
        let response = adapter.invoke(&request(None, None)).await.unwrap();
        assert_eq!(response.choices[0].finish_reason, "stop");
    }

    #[tokio::test]
    async fn test_upstream_error_propagates() {
        let server = MockServer::start().await;
        let body = serde_json::json!({"type": "error", "error": {"type": "overloaded_error"}});
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::with_base_url(reqwest::Client::new(), "a", server.uri());
        match adapter.invoke(&request(None, None)).await {
            Err(ProviderError::Upstream { status, body: got }) => {
                assert_eq!(status, 529);
                assert_eq!(got, body);
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }
}
