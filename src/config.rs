//! Server configuration, loadable from TOML.
//!
//! ```toml
//! address = "0.0.0.0"
//! port = 8080
//! workers = 8
//! max_request_size = 16384
//! ```
//!
//! Every key is optional; missing keys take the values of
//! [`ServerConfig::default`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Bytes read from a connection in its single read.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 8 * 1024;

/// Largest accepted `max_request_size`. Each connection allocates a buffer
/// of the configured size up front.
pub const MAX_REQUEST_SIZE_LIMIT: usize = 8 * 1024 * 1024;

/// Number of connection workers when none is configured.
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("at least one worker is required")]
    NoWorkers,

    #[error("max_request_size must be greater than zero")]
    ZeroRequestSize,

    #[error("max_request_size of {size} bytes exceeds the limit of {limit} bytes")]
    RequestSizeTooLarge { size: usize, limit: usize },
}

/// Where to listen and how many workers to run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub workers: usize,
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_owned(),
            port: 8080,
            workers: DEFAULT_WORKERS,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(address: impl Into<String>, port: u16, workers: usize) -> Self {
        Self {
            address: address.into(),
            port,
            workers,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.max_request_size == 0 {
            return Err(ConfigError::ZeroRequestSize);
        }
        if self.max_request_size > MAX_REQUEST_SIZE_LIMIT {
            return Err(ConfigError::RequestSizeTooLarge {
                size: self.max_request_size,
                limit: MAX_REQUEST_SIZE_LIMIT,
            });
        }
        Ok(())
    }

    /// `address:port`, as passed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
