//! Outbound transport.
//!
//! # Responsibilities
//! - Issue the validated request to the destination
//! - Enforce the caller's timeout
//! - Buffer the full response (status, content-type, body)
//!
//! # Design Decisions
//! - Redirects are never followed; the 3xx response is passed through
//! - No retries: a transport error or timeout is reported once
//! - The transport sits behind the `Upstream` trait so the pipeline can be
//!   driven without a network

use std::future::Future;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Outbound request body.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Serialized as JSON.
    Json(Value),
    /// Sent as-is.
    Raw(Bytes),
    /// Sent `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

/// A validated, sanitized request ready to send.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Body,
    pub timeout: Duration,
}

/// The buffered destination response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Transport(String),
}

/// Capability to send an outbound request.
pub trait Upstream: Send + Sync + 'static {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, UpstreamError>> + Send;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

impl Upstream for HttpUpstream {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let timeout = request.timeout;
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Raw(bytes) => builder.body(bytes),
            Body::Form(pairs) => builder.form(&pairs),
        };

        let response = builder.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout(timeout)
    } else {
        UpstreamError::Transport(err.to_string())
    }
}
