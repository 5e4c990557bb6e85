//! # Configuration Management
//!
//! Settings for the UDP transport engine.
//!
//! This module provides the configuration surface consumed by
//! [`TransportEngine`](crate::transport::udp::TransportEngine): datagram
//! size, connection capacity, and the local bind address.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()` (`UDP_TRANSPORT_*`)
//! - Direct instantiation with defaults
//!
//! Every source funnels through `validate()`; the engine refuses to build
//! from a configuration that fails `validate_strict()`.

use crate::core::header::HEADER_LEN;
use crate::error::{Result, TransportError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;

/// Default maximum datagram size in bytes, header included
pub const DEFAULT_MTU: usize = 1024;

/// Default connection table capacity
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Default local endpoint
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:2345";

/// Largest payload a UDP/IPv4 datagram can carry
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// Transport configuration covering one engine instance
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum total bytes per datagram, header included
    pub mtu: usize,

    /// Connection table capacity; both local and inbound connects are
    /// rejected past this bound
    pub max_connections: usize,

    /// Local endpoint for `bind`, as `address:port`
    pub bind_address: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

impl TransportConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| TransportError::Config(format!("failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| TransportError::Config(format!("failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| TransportError::Config(format!("failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(mtu) = std::env::var("UDP_TRANSPORT_MTU") {
            if let Ok(val) = mtu.parse::<usize>() {
                config.mtu = val;
            }
        }

        if let Ok(max) = std::env::var("UDP_TRANSPORT_MAX_CONNECTIONS") {
            if let Ok(val) = max.parse::<usize>() {
                config.max_connections = val;
            }
        }

        if let Ok(addr) = std::env::var("UDP_TRANSPORT_BIND_ADDRESS") {
            config.bind_address = addr;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TransportError::Config(format!("failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| TransportError::Config(format!("failed to write config file: {e}")))?;

        Ok(())
    }

    /// The parsed bind address. IPv6 endpoints are rejected because the
    /// wire format only carries IPv4 addresses.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr: SocketAddr = self
            .bind_address
            .parse()
            .map_err(|e| TransportError::Config(format!("invalid bind address: {e}")))?;
        if addr.is_ipv6() {
            return Err(TransportError::UnsupportedAddressFamily);
        }
        Ok(addr)
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.mtu < HEADER_LEN {
            errors.push(format!(
                "mtu ({}) cannot hold the {HEADER_LEN} byte packet header",
                self.mtu
            ));
        }

        if self.mtu > MAX_DATAGRAM_SIZE {
            errors.push(format!(
                "mtu ({}) exceeds the maximum UDP datagram size ({MAX_DATAGRAM_SIZE})",
                self.mtu
            ));
        }

        if self.max_connections == 0 {
            errors.push("max_connections must be at least 1".to_string());
        }

        match self.bind_address.parse::<SocketAddr>() {
            Ok(addr) if addr.is_ipv6() => {
                errors.push(format!(
                    "bind_address ({}) is IPv6; only IPv4 endpoints are supported",
                    self.bind_address
                ));
            }
            Ok(_) => {}
            Err(e) => {
                errors.push(format!(
                    "bind_address ({}) is not a valid socket address: {e}",
                    self.bind_address
                ));
            }
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TransportError::Config(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}
