//! Rate-limit policy block and request keying.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderMap;

use crate::config::RateLimitConfig;

use super::PolicyError;

/// Telemetry headers set on every rate-limited response, allowed or not.
pub const STATE_HEADER: &str = "rate-limiting-state";
pub const EXPIRES_AT_HEADER: &str = "rate-limiting-expires-at";
pub const TOTAL_REQUESTS_HEADER: &str = "rate-limiting-total-requests";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolved rate-limit block for one route, inherited verbatim from the
/// parent unless the route overrides it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub enabled: bool,
    pub limit: u64,
    pub duration: Duration,
}

impl RateLimit {
    /// Apply a route's rate-limit block on top of the inherited value.
    pub fn overlay(&mut self, cfg: &RateLimitConfig) {
        if let Some(enabled) = cfg.enabled {
            self.enabled = enabled;
        }

        if let Some(limit) = cfg.limit {
            self.limit = limit;
        }

        if let Some(duration) = cfg.duration {
            self.duration = duration;
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.enabled {
            return Ok(());
        }

        if self.limit == 0 {
            return Err(PolicyError::ZeroLimit);
        }

        if self.duration.is_zero() {
            return Err(PolicyError::ZeroDuration);
        }

        Ok(())
    }
}

/// Derive the limiter key for a request: the first client address in
/// `X-Forwarded-For` (the L7 balancer in front of us always appends one),
/// falling back to the peer address for direct connections.
///
/// A present but non-ASCII header is a malformed request.
pub fn key_from_request(headers: &HeaderMap, peer: SocketAddr) -> Result<String, String> {
    if let Some(value) = headers.get(X_FORWARDED_FOR) {
        let value = value
            .to_str()
            .map_err(|_| "x-forwarded-for is not valid ASCII".to_string())?;

        if let Some(first) = value.split(',').next() {
            let first = first.trim();

            if !first.is_empty() {
                return Ok(first.to_string());
            }
        }
    }

    Ok(peer.ip().to_string())
}
