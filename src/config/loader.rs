//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: '{value}'")]
    Env { name: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn read_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Apply the environment-style overrides.
///
/// | Variable | Field |
/// |---|---|
/// | `PROXY_SECRET_128` | `security.secret` |
/// | `FAILED_THRESHOLD` | `security.failed_threshold` |
/// | `FAILED_WINDOW_SECONDS` | `security.failed_window_secs` |
/// | `ALLOWED_HOSTS` | `security.allowed_hosts` (comma separated) |
/// | `BLACKLIST_FILE` | `security.blacklist_path` |
/// | `TRUST_FORWARDED_FOR` | `security.trust_forwarded_for` |
/// | `HOST` / `PORT` | `listener.bind_address` |
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("PROXY_SECRET_128") {
        config.security.secret = secret;
    }
    if let Some(value) = lookup("FAILED_THRESHOLD") {
        config.security.failed_threshold = parse_env("FAILED_THRESHOLD", value)?;
    }
    if let Some(value) = lookup("FAILED_WINDOW_SECONDS") {
        config.security.failed_window_secs = parse_env("FAILED_WINDOW_SECONDS", value)?;
    }
    if let Some(value) = lookup("ALLOWED_HOSTS") {
        config.security.allowed_hosts = value
            .split(',')
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
    }
    if let Some(path) = lookup("BLACKLIST_FILE") {
        config.security.blacklist_path = path;
    }
    if let Some(value) = lookup("TRUST_FORWARDED_FOR") {
        config.security.trust_forwarded_for = parse_env("TRUST_FORWARDED_FOR", value)?;
    }

    let host = lookup("HOST");
    let port = lookup("PORT");
    if host.is_some() || port.is_some() {
        let (current_host, current_port) = split_bind_address(&config.listener.bind_address);
        let host = host.unwrap_or(current_host);
        let port: u16 = match port {
            Some(value) => parse_env("PORT", value)?,
            None => current_port.parse().map_err(|_| ConfigError::Env {
                name: "PORT",
                value: current_port.clone(),
            })?,
        };
        config.listener.bind_address = join_bind_address(&host, port);
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { name, value })
}

fn split_bind_address(address: &str) -> (String, String) {
    match address.rsplit_once(':') {
        Some((host, port)) => (
            host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port.to_string(),
        ),
        None => (address.to_string(), "8280".to_string()),
    }
}

fn join_bind_address(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
