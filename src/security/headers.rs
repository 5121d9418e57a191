//! Header sanitization for forwarded requests.
//!
//! # Responsibilities
//! - Strip hop-by-hop and connection-management headers supplied by the caller
//! - Reject header names and values that are not valid HTTP
//!
//! # Design Decisions
//! - Names are matched case-insensitively against a fixed lowercase set
//! - The outbound client recomputes framing headers (content-length, host)

use std::collections::BTreeMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ProxyError;

/// Headers never relayed to the destination.
pub const HOP_BY_HOP_HEADERS: [&str; 10] = [
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Build the outbound header map from caller-supplied headers, dropping
/// hop-by-hop names.
pub fn sanitize_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ProxyError> {
    let mut sanitized = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name) {
            tracing::debug!(header = %name, "Dropping hop-by-hop header");
            continue;
        }
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ProxyError::BadRequest(format!("Invalid header name '{name}'")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ProxyError::BadRequest(format!("Invalid value for header '{name}'")))?;
        sanitized.append(name, value);
    }
    Ok(sanitized)
}
