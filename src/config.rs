//! Configuration for linkrelay
//!
//! Centralized configuration with sensible defaults. Values can come from the
//! builder, a TOML file, or both (file first, then builder overrides in the
//! binaries).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::endpoint::Endpoint;
use crate::error::{RelayError, Result};

/// Main configuration shared by client and server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Daemon address. The client connects here, the server binds here.
    pub endpoint: Endpoint,

    // -------------------------------------------------------------------------
    // Client Configuration
    // -------------------------------------------------------------------------
    /// Deadline for a whole exchange: connect + write + read (milliseconds)
    pub timeout_ms: u64,

    /// Responses larger than this abort the exchange (bytes)
    pub max_response_bytes: usize,

    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// Longest accepted command line, terminator excluded (bytes)
    pub max_line_bytes: usize,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Time allowed for a client to finish its command sequence (milliseconds)
    pub read_timeout_ms: u64,

    /// Time allowed for writing a response back (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            timeout_ms: 5000,
            max_response_bytes: 1024 * 1024, // 1 MB
            max_line_bytes: 8 * 1024,
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| RelayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Reject values that would make the client or server unusable
    pub fn validate(&self) -> Result<()> {
        self.endpoint.validate()?;

        let checks = [
            ("timeout_ms", self.timeout_ms == 0),
            ("max_response_bytes", self.max_response_bytes == 0),
            ("max_line_bytes", self.max_line_bytes == 0),
            ("max_connections", self.max_connections == 0),
            ("read_timeout_ms", self.read_timeout_ms == 0),
            ("write_timeout_ms", self.write_timeout_ms == 0),
        ];
        if let Some((name, _)) = checks.iter().find(|(_, zero)| *zero) {
            return Err(RelayError::Config(format!("{} must be greater than 0", name)));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from an existing config (e.g. one loaded from a file)
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Set the daemon endpoint
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config.endpoint = endpoint;
        self
    }

    /// Set the exchange deadline (in milliseconds)
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    /// Set the response size cap (in bytes)
    pub fn max_response_bytes(mut self, size: usize) -> Self {
        self.config.max_response_bytes = size;
        self
    }

    /// Set the command line length cap (in bytes)
    pub fn max_line_bytes(mut self, size: usize) -> Self {
        self.config.max_line_bytes = size;
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
