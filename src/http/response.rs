//! Response handling and transformation.
//!
//! # Responsibilities
//! - Pass the destination's status and body through unchanged
//! - Normalize content-type (fallback `application/octet-stream`)
//! - Map proxy errors to status codes with a JSON `detail` body
//!
//! # Design Decisions
//! - No destination headers other than content-type are relayed
//! - Upstream transport errors map to 502, timeouts to 504

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::ProxyError;
use crate::forward::upstream::UpstreamResponse;

pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Build the client response from the destination's response.
pub fn passthrough(upstream: UpstreamResponse) -> Response {
    let content_type = upstream
        .content_type
        .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Proxy call failed");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Bytes};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_passthrough_keeps_status_and_body() {
        let response = passthrough(UpstreamResponse {
            status: StatusCode::NOT_FOUND,
            content_type: Some(HeaderValue::from_static("application/json")),
            body: Bytes::from_static(br#"{"x":1}"#),
        });

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers().len(), 1);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"x":1}"#);
    }

    #[tokio::test]
    async fn test_passthrough_fallback_content_type() {
        let response = passthrough(UpstreamResponse {
            status: StatusCode::FOUND,
            content_type: None,
            body: Bytes::new(),
        });
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], FALLBACK_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ProxyError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "detail": "Invalid or missing secret" }));
    }
}
