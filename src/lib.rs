//! Secret-gated HTTP forwarding proxy.
//!
//! Callers present a shared 128-character secret in `X-Proxy-Secret` and a
//! JSON description of an outbound request on `POST /proxy`. Authenticated
//! calls are relayed to the destination and its status and body returned
//! verbatim. Sources that fail authentication too often are blacklisted in
//! an append-only file.

pub mod config;
pub mod error;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use forward::ForwardingPipeline;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
