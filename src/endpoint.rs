//! Daemon endpoint
//!
//! The (host, port) pair the daemon listens on. Immutable once built.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{RelayError, Result};

/// Default daemon host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default daemon port
pub const DEFAULT_PORT: u16 = 9999;

/// Address of the daemon's listening socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Endpoint {
    /// Create an endpoint, rejecting an empty host or port 0
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let endpoint = Self {
            host: host.into(),
            port,
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    /// Create an endpoint from a port number that may be out of range
    pub fn with_port_number(host: impl Into<String>, port: u32) -> Result<Self> {
        let port = u16::try_from(port)
            .map_err(|_| RelayError::Config(format!("Port {} out of range 1-65535", port)))?;
        Self::new(host, port)
    }

    /// Endpoint of an already-bound socket
    pub(crate) fn from_socket_addr(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Check the invariants that deserialization can't enforce
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RelayError::Config("Endpoint host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(RelayError::Config(
                "Endpoint port must be in range 1-65535".to_string(),
            ));
        }
        Ok(())
    }

    /// Address tuple accepted by tokio's connect/bind
    pub fn socket_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = RelayError;

    /// Parse `host:port` (IPv6 hosts in brackets: `[::1]:9999`)
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| RelayError::Config(format!("Expected host:port, got '{}'", s)))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        let port: u32 = port
            .parse()
            .map_err(|_| RelayError::Config(format!("Invalid port in '{}'", s)))?;

        Self::with_port_number(host, port)
    }
}
