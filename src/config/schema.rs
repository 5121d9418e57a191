//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Built-in secret used when neither the config file nor `PROXY_SECRET_128`
/// provides one. Exactly 128 characters.
// WARNING: This is a placeholder! Change this in production.
pub const DEFAULT_SECRET: &str = "CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_ME-CHANGE_M";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Secret, blacklist and target policy.
    pub security: SecurityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8280").
    pub bind_address: String,

    /// Maximum accepted size of an inbound request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8280".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Authentication, blacklist and destination policy.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Shared secret callers present in `X-Proxy-Secret`. Must be 128 characters.
    pub secret: String,

    /// Failed attempts inside one window that blacklist a source.
    pub failed_threshold: u32,

    /// Length of the failure counting window in seconds.
    pub failed_window_secs: u64,

    /// Destination hostnames allowed. Empty allows everything not denied.
    pub allowed_hosts: Vec<String>,

    /// Append-only blacklist file, one source address per line.
    pub blacklist_path: String,

    /// Take the source address from the first `X-Forwarded-For` entry.
    /// Only enable behind a reverse proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl SecurityConfig {
    /// Whether the built-in placeholder secret is still in use.
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SECRET
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.to_string(),
            failed_threshold: 5,
            failed_window_secs: 600,
            allowed_hosts: Vec::new(),
            blacklist_path: "blacklist.txt".to_string(),
            trust_forwarded_for: false,
        }
    }
}

// Manual impl keeps the secret out of logs.
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("secret", &"<redacted>")
            .field("failed_threshold", &self.failed_threshold)
            .field("failed_window_secs", &self.failed_window_secs)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("blacklist_path", &self.blacklist_path)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall inbound request timeout in seconds. Kept above the largest
    /// per-request upstream timeout (120s) so the upstream timeout fires first.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 130 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
