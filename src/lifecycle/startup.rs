//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into a ready forwarding pipeline
//! - Start optional background services (metrics endpoint)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, ProxyConfig, ValidationError};
use crate::forward::{ForwardingPipeline, HttpUpstream};
use crate::observability::metrics;
use crate::security::{
    BlacklistError, BlacklistStore, FailureTracker, SecretVerifier, TargetValidator,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid secret: {0}")]
    Secret(#[from] ValidationError),

    #[error(transparent)]
    Blacklist(#[from] BlacklistError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to start metrics endpoint: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the production pipeline (reqwest transport) from config.
pub fn build_pipeline(
    config: &ProxyConfig,
) -> Result<ForwardingPipeline<HttpUpstream>, StartupError> {
    let security = &config.security;

    let secret = SecretVerifier::new(security.secret.clone())?;
    if security.uses_default_secret() {
        tracing::warn!("Using the built-in placeholder secret; set PROXY_SECRET_128");
    }

    let blacklist = Arc::new(BlacklistStore::open(&security.blacklist_path)?);
    let failures = FailureTracker::from_config(security, blacklist.clone());
    let targets = TargetValidator::new(&security.allowed_hosts);
    let upstream = HttpUpstream::new()?;

    let blacklisted = blacklist.len()?;
    tracing::info!(
        blacklisted,
        failed_threshold = failures.threshold(),
        failed_window_secs = failures.window().as_secs(),
        allowed_hosts = ?security.allowed_hosts,
        "Security subsystem initialized"
    );

    Ok(ForwardingPipeline::new(secret, blacklist, failures, targets, upstream))
}

/// Start the Prometheus endpoint if enabled.
pub fn start_metrics(config: &ProxyConfig) -> Result<(), StartupError> {
    if !config.observability.metrics_enabled {
        return Ok(());
    }
    let addr = resolve(&config.observability.metrics_address)?;
    metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))
}

/// Resolve a `host:port` that may name a DNS host.
fn resolve(address: &str) -> Result<SocketAddr, StartupError> {
    address
        .to_socket_addrs()
        .map_err(|e| StartupError::Metrics(format!("cannot resolve '{address}': {e}")))?
        .next()
        .ok_or_else(|| StartupError::Metrics(format!("'{address}' resolved to no addresses")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_pipeline_rejects_short_secret() {
        let mut config = ProxyConfig::default();
        config.security.secret = "short".into();
        assert!(matches!(
            build_pipeline(&config),
            Err(StartupError::Secret(ValidationError::SecretLength { actual: 5 }))
        ));
    }

    #[test]
    fn test_resolve_accepts_hostnames() {
        assert!(resolve("localhost:9090").unwrap().ip().is_loopback());
        assert_eq!(
            resolve("127.0.0.1:9090").unwrap(),
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );
        assert!(matches!(resolve("no-port"), Err(StartupError::Metrics(_))));
    }

    #[test]
    fn test_build_pipeline_creates_blacklist_file() {
        let path = std::env::temp_dir().join(format!("startup-{}.txt", uuid::Uuid::new_v4()));
        let mut config = ProxyConfig::default();
        config.security.blacklist_path = path.display().to_string();

        let pipeline = build_pipeline(&config).unwrap();
        assert!(path.exists());
        assert_eq!(pipeline.failures().threshold(), 5);

        std::fs::remove_file(path).unwrap_or_default();
    }
}
