//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files. Every
//! field has a default so an empty file (or no file at all) is a valid config.

use serde::{Deserialize, Serialize};

/// Root configuration for the mock proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Mock rule source.
    pub mocks: MocksConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Where mock rules come from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MocksConfig {
    /// Directory scanned for `*.json` files and mock folders.
    pub dir: String,

    /// Reload rules automatically when the directory changes.
    pub watch: bool,
}

impl Default for MocksConfig {
    fn default() -> Self {
        Self {
            dir: "mocks".to_string(),
            watch: false,
        }
    }
}

/// Timeout configuration for upstream exchanges.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connect timeout (DNS + TCP + handshake) in seconds.
    pub connect_secs: u64,

    /// Maximum silence between upstream response frames in seconds. 0 disables.
    pub idle_secs: u64,

    /// Deadline for the upstream response head in seconds, counted from the
    /// end of the request upload. 0 disables.
    pub response_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            idle_secs: 60,
            response_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
