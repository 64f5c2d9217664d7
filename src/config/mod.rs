//! Configuration: environment-backed settings and the YAML routing table.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Process-level settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP listen port.
    pub port: u16,

    /// HTTP bind address.
    pub bind_addr: IpAddr,

    /// Location of the YAML provider configuration.
    pub config_path: PathBuf,

    /// Redis host for the exact cache.
    pub redis_host: String,

    /// Redis port for the exact cache.
    pub redis_port: u16,

    /// Qdrant endpoint for the semantic index.
    pub qdrant_url: String,

    /// SQLite connection string for the key store.
    pub database_url: String,

    /// Directory holding the embedding model files; stub embedder when unset.
    pub model_dir: Option<PathBuf>,

    /// Exact-cache entry TTL in seconds.
    pub cache_ttl_secs: u64,

    /// Completions-endpoint budget per principal per minute.
    pub rate_limit_per_minute: u32,

    /// Minimum cosine similarity for a semantic-cache hit.
    pub similarity_threshold: f32,
}

/// Default Qdrant endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            config_path: PathBuf::from("config.yaml"),
            redis_host: "redis".to_string(),
            redis_port: 6379,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            database_url: "sqlite://gateway.db".to_string(),
            model_dir: None,
            cache_ttl_secs: 3600,
            rate_limit_per_minute: 10,
            similarity_threshold: 0.95,
        }
    }
}

impl Settings {
    const ENV_PORT: &'static str = "SWITCHBOARD_PORT";
    const ENV_BIND_ADDR: &'static str = "SWITCHBOARD_BIND_ADDR";
    const ENV_CONFIG_PATH: &'static str = "SWITCHBOARD_CONFIG_PATH";
    const ENV_REDIS_HOST: &'static str = "REDIS_HOST";
    const ENV_REDIS_PORT: &'static str = "REDIS_PORT";
    const ENV_QDRANT_URL: &'static str = "SWITCHBOARD_QDRANT_URL";
    const ENV_DATABASE_URL: &'static str = "SWITCHBOARD_DATABASE_URL";
    const ENV_MODEL_DIR: &'static str = "SWITCHBOARD_MODEL_DIR";
    const ENV_CACHE_TTL_SECS: &'static str = "SWITCHBOARD_CACHE_TTL_SECS";
    const ENV_RATE_LIMIT: &'static str = "SWITCHBOARD_RATE_LIMIT_PER_MINUTE";
    const ENV_SIMILARITY_THRESHOLD: &'static str = "SWITCHBOARD_SIMILARITY_THRESHOLD";

    /// Reads settings from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(Self::ENV_PORT, defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let config_path = Self::parse_path_from_env(Self::ENV_CONFIG_PATH, defaults.config_path);
        let redis_host = Self::parse_string_from_env(Self::ENV_REDIS_HOST, defaults.redis_host);
        let redis_port = Self::parse_port_from_env(Self::ENV_REDIS_PORT, defaults.redis_port)?;
        let qdrant_url = Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url);
        let database_url =
            Self::parse_string_from_env(Self::ENV_DATABASE_URL, defaults.database_url);
        let model_dir = Self::parse_optional_path_from_env(Self::ENV_MODEL_DIR);
        let cache_ttl_secs =
            Self::parse_u64_from_env(Self::ENV_CACHE_TTL_SECS, defaults.cache_ttl_secs);
        let rate_limit_per_minute =
            Self::parse_u32_from_env(Self::ENV_RATE_LIMIT, defaults.rate_limit_per_minute);
        let similarity_threshold = Self::parse_f32_from_env(
            Self::ENV_SIMILARITY_THRESHOLD,
            defaults.similarity_threshold,
        );

        Ok(Self {
            port,
            bind_addr,
            config_path,
            redis_host,
            redis_port,
            qdrant_url,
            database_url,
            model_dir,
            cache_ttl_secs,
            rate_limit_per_minute,
            similarity_threshold,
        })
    }

    /// `host:port` string for the TCP listener.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Connection URL for the exact-cache Redis backend.
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }

    fn parse_port_from_env(var_name: &str, default: u16) -> Result<u16, ConfigError> {
        match env::var(var_name) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_u32_from_env(var_name: &str, default: u32) -> u32 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_f32_from_env(var_name: &str, default: f32) -> f32 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// Which adapter family serves a configured provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions (pass-through).
    Openai,
    /// Google Gemini `generateContent`.
    Google,
    /// Anthropic Messages API.
    Anthropic,
}

impl ProviderKind {
    /// Returns the configuration-file name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Google => "google",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider entry in the routing table.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Adapter family.
    pub name: ProviderKind,
    /// Environment variable holding the upstream credential.
    ///
    /// Resolved when a model routes to this provider, not at load time, so
    /// the gateway can start with a partially configured environment.
    pub api_key_env: String,
    /// Model ids served by this provider.
    pub models: Vec<String>,
}

/// Ordered provider routing table loaded from YAML.
///
/// Order is significant: the first provider whose `models` list contains the
/// requested id wins.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Providers in priority order.
    pub providers: Vec<ProviderConfig>,
}

impl GatewayConfig {
    /// Loads and validates the routing table. A missing file is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: GatewayConfig =
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::FileParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for provider in &self.providers {
            if provider.models.is_empty() {
                return Err(ConfigError::EmptyModelList {
                    provider: provider.name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Finds the first provider serving `model`, if any.
    pub fn provider_for(&self, model: &str) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.models.iter().any(|m| m == model))
    }
}
