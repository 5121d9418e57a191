//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, source address)
//!     → request.rs (deserialize + validate ProxyRequest)
//!     → [forward::pipeline authenticates and forwards]
//!     → response.rs (status/body passthrough or error JSON)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{ProxyMethod, ProxyRequest, RawData};
pub use server::{AppState, HttpServer};
