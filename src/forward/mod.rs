//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (from http::server)
//!     → pipeline.rs (blacklist, secret, failures, target policy)
//!     → upstream.rs (send via reqwest, buffer response)
//!     → UpstreamResponse (to http::response)
//! ```
//!
//! # Design Decisions
//! - Single attempt per call: no retries, no redirect following
//! - The transport is a trait so the pipeline runs without a network in tests

pub mod pipeline;
pub mod upstream;

pub use pipeline::ForwardingPipeline;
pub use upstream::{Body, HttpUpstream, OutboundRequest, Upstream, UpstreamError, UpstreamResponse};
