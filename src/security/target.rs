//! Destination host policy.
//!
//! Only the parsed hostname is inspected, never the port or path. Loopback
//! names are always denied so the proxy cannot reach services bound to its
//! own host. A non-empty allow-list restricts destinations further.

use std::collections::HashSet;

use url::{Host, Url};

use crate::error::ProxyError;

/// Hostnames that are always rejected.
pub const DENIED_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

#[derive(Debug, Clone, Default)]
pub struct TargetValidator {
    allowed: HashSet<String>,
}

impl TargetValidator {
    /// Build a validator. An empty allow-list permits every host not denied.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = allowed
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { allowed }
    }

    pub fn validate(&self, url: &Url) -> Result<(), ProxyError> {
        let host = hostname(url);
        if DENIED_HOSTS.contains(&host.as_str()) {
            tracing::warn!(host = %host, "Target host denied");
            return Err(ProxyError::BadTarget("Target host not allowed"));
        }
        if !self.allowed.is_empty() && !self.allowed.contains(&host) {
            tracing::warn!(host = %host, "Target host not in allowlist");
            return Err(ProxyError::BadTarget("Target host not in allowlist"));
        }
        Ok(())
    }
}

/// Lowercased hostname of `url`; IPv6 literals without brackets.
pub fn hostname(url: &Url) -> String {
    match url.host() {
        Some(Host::Domain(domain)) => domain.trim_end_matches('.').to_ascii_lowercase(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    }
}
