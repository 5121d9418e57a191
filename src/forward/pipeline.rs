//! The forwarding pipeline: every `/proxy` call runs through here.
//!
//! ```text
//! validate request ──✗──▶ BadRequest
//!        │
//! blacklisted? ──yes──▶ Blacklisted
//!        │
//! secret ok? ──no──▶ record failure ─▶ blacklisted now? ─▶ Blacklisted | Unauthorized
//!        │
//! target allowed? ──no──▶ BadTarget
//!        │
//! send upstream ──✗──▶ UpstreamFailure | UpstreamTimeout
//!        │
//!   UpstreamResponse
//! ```

use std::sync::Arc;
use std::time::Instant;

use crate::error::ProxyError;
use crate::forward::upstream::{Upstream, UpstreamResponse};
use crate::http::request::ProxyRequest;
use crate::observability::metrics;
use crate::security::{BlacklistStore, FailureTracker, SecretVerifier, TargetValidator};

pub struct ForwardingPipeline<U> {
    secret: SecretVerifier,
    blacklist: Arc<BlacklistStore>,
    failures: FailureTracker,
    targets: TargetValidator,
    upstream: U,
}

impl<U: Upstream> ForwardingPipeline<U> {
    pub fn new(
        secret: SecretVerifier,
        blacklist: Arc<BlacklistStore>,
        failures: FailureTracker,
        targets: TargetValidator,
        upstream: U,
    ) -> Self {
        Self {
            secret,
            blacklist,
            failures,
            targets,
            upstream,
        }
    }

    /// Authenticate, validate and forward one call from `source`.
    pub async fn handle(
        &self,
        source: &str,
        presented_secret: Option<&str>,
        request: ProxyRequest,
    ) -> Result<UpstreamResponse, ProxyError> {
        let outbound = request.into_outbound()?;

        if self.blacklist.is_blacklisted(source)? {
            tracing::warn!(source = %source, "Rejected blacklisted source");
            return Err(ProxyError::Blacklisted);
        }

        if !self.secret.verify(presented_secret) {
            self.failures.record_failure(source)?;
            // The failure just recorded may have tipped the source over.
            if self.blacklist.is_blacklisted(source)? {
                return Err(ProxyError::Blacklisted);
            }
            return Err(ProxyError::Unauthorized);
        }

        self.targets.validate(&outbound.url)?;

        tracing::debug!(
            source = %source,
            method = %outbound.method,
            url = %outbound.url,
            timeout = ?outbound.timeout,
            "Forwarding request"
        );

        let started = Instant::now();
        let result = self.upstream.send(outbound).await;
        metrics::record_upstream_latency(started, result.is_ok());

        match result {
            Ok(response) => {
                tracing::debug!(
                    source = %source,
                    status = %response.status,
                    bytes = response.body.len(),
                    "Upstream responded"
                );
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Upstream call failed");
                Err(e.into())
            }
        }
    }

    pub fn blacklist(&self) -> &BlacklistStore {
        &self.blacklist
    }

    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }
}
