//! Google Gemini adapter.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::error::ProviderError;
use super::{completion_id, unix_timestamp, upstream_error, word_count};
use crate::api::{ChatRequest, ChatResponse, Role, Usage};

/// Fallback body when the upstream blocks or returns no content.
const SAFETY_FALLBACK_MESSAGE: &str =
    "The response was blocked by the provider's safety filters. Please rephrase your request.";

const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Adapter for the Gemini `generateContent` REST API.
///
/// Gemini does not report prompt token counts, so both sides of `usage`
/// are estimated by whitespace word count.
#[derive(Clone, Debug)]
pub struct GoogleAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(rename = "generationConfig")]
    generation_config: WireGenerationConfig,
}

#[derive(Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Serialize)]
struct WirePart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Deserialize)]
struct WireCandidate {
    content: Option<WireCandidateContent>,
}

#[derive(Deserialize)]
struct WireCandidateContent {
    #[serde(default)]
    parts: Vec<WireResponsePart>,
}

#[derive(Deserialize)]
struct WireResponsePart {
    text: Option<String>,
}

impl GoogleAdapter {
    /// Production endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

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

    /// Gemini role names: assistant turns are `model`, everything else
    /// (system included, which Gemini lacks) degrades to `user`.
    fn gemini_role(role: Role) -> &'static str {
        match role {
            Role::Assistant => "model",
            Role::User | Role::System => "user",
        }
    }

    /// Calls `generateContent` and reshapes the reply into canonical form.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let contents = request
            .messages
            .iter()
            .map(|m| WireContent {
                role: Self::gemini_role(m.role),
                parts: vec![WirePart {
                    text: m.content.clone(),
                }],
            })
            .collect();

        let body = WireRequest {
            contents,
            generation_config: WireGenerationConfig {
                max_output_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
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
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty());

        let text = match text {
            Some(text) => text,
            None => {
                warn!("Gemini returned no usable content; substituting safety fallback");
                SAFETY_FALLBACK_MESSAGE.to_string()
            }
        };

        // No token accounting from the upstream; estimate by word count.
        let prompt_words: u64 = request
            .messages
            .iter()
            .map(|m| word_count(&m.content))
            .sum();
        let completion_words = word_count(&text);

        debug!(
            prompt_tokens = prompt_words,
            completion_tokens = completion_words,
            "Gemini upstream responded"
        );

        let now = unix_timestamp();
        Ok(ChatResponse::single(
            completion_id(now),
            now,
            &request.model,
            text,
            "stop",
            Usage::new(prompt_words, completion_words),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatMessage;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gemini-2.5-flash".to_string(),
            messages: vec![
                ChatMessage::new(Role::System, "Be brief."),
                ChatMessage::new(Role::User, "Tell me about Paris"),
                ChatMessage::new(Role::Assistant, "What about it?"),
                ChatMessage::new(Role::User, "Population?"),
            ],
            temperature: Some(0.5),
            max_tokens: None,
        }
    }

    fn gemini_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": text}]}}
            ]
        })
    }

    #[tokio::test]
    async fn test_translates_roles_and_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "g-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Be brief."}]},
                    {"role": "user", "parts": [{"text": "Tell me about Paris"}]},
                    {"role": "model", "parts": [{"text": "What about it?"}]},
                    {"role": "user", "parts": [{"text": "Population?"}]},
                ],
                "generationConfig": {"maxOutputTokens": 1000, "temperature": 0.5},
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(gemini_reply("About 2.1 million people")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let adapter = GoogleAdapter::with_base_url(reqwest::Client::new(), "g-key", server.uri());
        let response = adapter.invoke(&request()).await.unwrap();

        assert_eq!(response.object, "chat.completion");
        assert_eq!(response.model, "gemini-2.5-flash");
        assert_eq!(response.content(), Some("About 2.1 million people"));
        assert!(response.id.starts_with("chatcmpl-"));
        assert_eq!(response.choices[0].finish_reason, "stop");
    }

    #[tokio::test]
    async fn test_usage_estimated_by_word_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("one two three")))
            .mount(&server)
            .await;

        let adapter = GoogleAdapter::with_base_url(reqwest::Client::new(), "g-key", server.uri());
        let response = adapter.invoke(&request()).await.unwrap();

        // "Be brief." (2) + "Tell me about Paris" (4) + "What about it?" (3)
        // + "Population?" (1) = 10 prompt words.
        assert_eq!(response.usage.prompt_tokens, 10);
        assert_eq!(response.usage.completion_tokens, 3);
        assert_eq!(response.usage.total_tokens, 13);
    }

    #[tokio::test]
    async fn test_blocked_content_yields_safety_fallback() {
        let server = MockServer::start().await;
        // A safety-blocked reply has no candidates.
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}})),
            )
            .mount(&server)
            .await;

        let adapter = GoogleAdapter::with_base_url(reqwest::Client::new(), "g-key", server.uri());
        let response = adapter.invoke(&request()).await.unwrap();

        assert_eq!(response.content(), Some(SAFETY_FALLBACK_MESSAGE));
        assert_eq!(response.choices[0].finish_reason, "stop");
    }

    #[tokio::test]
    async fn test_upstream_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"error": {"status": "PERMISSION_DENIED"}})),
            )
            .mount(&server)
            .await;

        let adapter = GoogleAdapter::with_base_url(reqwest::Client::new(), "bad", server.uri());
        match adapter.invoke(&request()).await {
            Err(ProviderError::Upstream { status, .. }) => assert_eq!(status, 403),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }
}
