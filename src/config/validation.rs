//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threshold and window > 0, addresses parse)
//! - Enforce the fixed secret length
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::security::secret::SECRET_LEN;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("secret must be exactly {SECRET_LEN} characters long (got {actual})")]
    SecretLength { actual: usize },

    #[error("failed_threshold must be at least 1")]
    ZeroThreshold,

    #[error("failed_window_secs must be at least 1")]
    ZeroWindow,

    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("timeouts.request_secs must be at least 1")]
    ZeroRequestTimeout,
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let secret_len = config.security.secret.chars().count();
    if secret_len != SECRET_LEN {
        errors.push(ValidationError::SecretLength { actual: secret_len });
    }
    if config.security.failed_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold);
    }
    if config.security.failed_window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if !is_host_port(&config.listener.bind_address) {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && !is_host_port(&config.observability.metrics_address)
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host and a numeric port. The host may be a
/// DNS name; resolution is left to the bind.
fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            !host.is_empty() && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}
