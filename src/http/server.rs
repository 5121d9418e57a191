//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the `/proxy` and `/health` handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Resolve the caller's source address
//! - Bind server to listener and shut down gracefully

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, DefaultBodyLimit, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::forward::{ForwardingPipeline, Upstream};
use crate::http::request::ProxyRequest;
use crate::http::response::passthrough;
use crate::lifecycle::shutdown;
use crate::lifecycle::startup::{build_pipeline, StartupError};
use crate::observability::metrics;
use crate::security::SECRET_HEADER;

/// Application state injected into handlers.
pub struct AppState<U> {
    pub pipeline: Arc<ForwardingPipeline<U>>,
    pub trust_forwarded_for: bool,
}

impl<U> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server with the production (reqwest) transport.
    pub fn from_config(config: ProxyConfig) -> Result<Self, StartupError> {
        let pipeline = build_pipeline(&config)?;
        Ok(Self::new(config, pipeline))
    }

    /// Create a server around an already-built pipeline.
    pub fn new<U: Upstream>(config: ProxyConfig, pipeline: ForwardingPipeline<U>) -> Self {
        let state = AppState {
            pipeline: Arc::new(pipeline),
            trust_forwarded_for: config.security.trust_forwarded_for,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<U: Upstream>(config: &ProxyConfig, state: AppState<U>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/proxy", post(proxy_handler::<U>))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Main proxy handler.
async fn proxy_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<ProxyRequest>, JsonRejection>,
) -> Response {
    let source = client_source(&headers, peer, state.trust_forwarded_for);

    let result = match payload {
        Ok(Json(request)) => {
            let secret = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
            state.pipeline.handle(&source, secret, request).await
        }
        Err(rejection) => Err(ProxyError::BadRequest(rejection.body_text())),
    };

    match result {
        Ok(upstream) => {
            metrics::record_request("forwarded", upstream.status.as_u16());
            passthrough(upstream)
        }
        Err(err) => {
            tracing::debug!(source = %source, kind = err.kind(), "Proxy call rejected");
            metrics::record_request(err.kind(), err.status().as_u16());
            err.into_response()
        }
    }
}

/// Source identifier for blacklist and failure tracking.
///
/// The TCP peer address, or the first `X-Forwarded-For` entry when the
/// deployment trusts it. Falls back to the peer if the header is unusable.
pub fn client_source(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    forwarded.unwrap_or(peer.ip()).to_canonical().to_string()
}
