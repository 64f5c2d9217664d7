//! Model → adapter resolution.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use super::error::RegistryError;
use super::{Adapter, AnthropicAdapter, GoogleAdapter, OpenAiAdapter};
use crate::config::{GatewayConfig, ProviderKind};

/// Default per-upstream-call timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolves model ids against the ordered routing table.
///
/// Credentials are read from the environment at resolution time, not at
/// startup, so a provider whose variable is absent only fails requests that
/// actually route to it. Adapters share one HTTP client (connection pool).
pub struct ProviderRegistry {
    config: GatewayConfig,
    client: reqwest::Client,
    base_url_overrides: HashMap<ProviderKind, String>,
}

impl ProviderRegistry {
    /// Builds a registry with a pooled client and the default timeout.
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_UPSTREAM_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::with_client(config, client)
    }

    /// Builds a registry over an existing client.
    pub fn with_client(config: GatewayConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            base_url_overrides: HashMap::new(),
        }
    }

    /// Points a provider family at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, kind: ProviderKind, base_url: impl Into<String>) -> Self {
        self.base_url_overrides.insert(kind, base_url.into());
        self
    }

    /// Returns the routing table.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Resolves a model id to a credentialed adapter.
    ///
    /// The first configured provider whose model list contains the id wins.
    pub fn resolve(&self, model: &str) -> Result<Adapter, RegistryError> {
        let provider = self
            .config
            .provider_for(model)
            .ok_or_else(|| RegistryError::NoProvider {
                model: model.to_string(),
            })?;

        let credential = std::env::var(&provider.api_key_env)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| RegistryError::MissingCredential {
                name: provider.api_key_env.clone(),
            })?;

        debug!(model, provider = %provider.name, "resolved provider");

        let adapter = match provider.name {
            ProviderKind::Openai => match self.base_url_overrides.get(&ProviderKind::Openai) {
                Some(url) => Adapter::OpenAi(OpenAiAdapter::with_base_url(
                    self.client.clone(),
                    credential,
                    url,
                )),
                None => Adapter::OpenAi(OpenAiAdapter::new(self.client.clone(), credential)),
            },
            ProviderKind::Google => match self.base_url_overrides.get(&ProviderKind::Google) {
                Some(url) => Adapter::Google(GoogleAdapter::with_base_url(
                    self.client.clone(),
                    credential,
                    url,
                )),
                None => Adapter::Google(GoogleAdapter::new(self.client.clone(), credential)),
            },
            ProviderKind::Anthropic => match self.base_url_overrides.get(&ProviderKind::Anthropic) {
                Some(url) => Adapter::Anthropic(AnthropicAdapter::with_base_url(
                    self.client.clone(),
                    credential,
                    url,
                )),
                None => Adapter::Anthropic(AnthropicAdapter::new(self.client.clone(), credential)),
            },
        };

        Ok(adapter)
    }
}
