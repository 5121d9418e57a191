//! Request-level error taxonomy.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::forward::upstream::UpstreamError;
use crate::security::blacklist::BlacklistError;

/// Why a proxy call was rejected. Every variant is terminal for the request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Source is blacklisted, possibly as a result of this very request.
    #[error("This IP is blacklisted")]
    Blacklisted,

    /// Secret missing, of the wrong length, or mismatched.
    #[error("Invalid or missing secret")]
    Unauthorized,

    /// Destination host denied by policy.
    #[error("{0}")]
    BadTarget(&'static str),

    /// Malformed proxy request: unparseable body or URL, unsupported
    /// method or scheme, timeout out of bounds, nested params or form
    /// fields, invalid headers, or `json` and `data` sent together.
    #[error("{0}")]
    BadRequest(String),

    /// Outbound transport failure.
    #[error("Upstream request failed: {0}")]
    UpstreamFailure(String),

    /// Outbound call exceeded the caller's timeout.
    #[error("Upstream request timed out after {0:?}")]
    UpstreamTimeout(Duration),

    /// The blacklist file could not be read or written.
    #[error(transparent)]
    Store(#[from] BlacklistError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Blacklisted => StatusCode::FORBIDDEN,
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::BadTarget(_) | ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Blacklisted => "blacklisted",
            ProxyError::Unauthorized => "unauthorized",
            ProxyError::BadTarget(_) => "bad_target",
            ProxyError::BadRequest(_) => "bad_request",
            ProxyError::UpstreamFailure(_) => "upstream_failure",
            ProxyError::UpstreamTimeout(_) => "upstream_timeout",
            ProxyError::Store(_) => "internal",
        }
    }

    /// Message returned to the caller. Store errors are not detailed.
    pub fn detail(&self) -> String {
        match self {
            ProxyError::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<UpstreamError> for ProxyError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout(after) => ProxyError::UpstreamTimeout(after),
            UpstreamError::Transport(msg) => ProxyError::UpstreamFailure(msg),
        }
    }
}
