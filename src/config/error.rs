//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort {
        /// The rejected value.
        value: String,
    },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        /// The rejected value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        /// The rejected value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// The provider configuration file does not exist.
    ///
    /// This is fatal at startup: without a routing table the gateway cannot
    /// resolve any model.
    #[error("configuration file not found at {path}")]
    FileNotFound {
        /// Expected location.
        path: PathBuf,
    },

    /// The provider configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    FileRead {
        /// File location.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The provider configuration file is not valid YAML for the schema.
    #[error("failed to parse configuration file {path}: {source}")]
    FileParse {
        /// File location.
        path: PathBuf,
        /// YAML failure.
        #[source]
        source: serde_yaml::Error,
    },

    /// A provider entry declares no models.
    #[error("provider '{provider}' declares no models")]
    EmptyModelList {
        /// Offending provider name.
        provider: String,
    },
}
