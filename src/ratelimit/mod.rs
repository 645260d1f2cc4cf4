//! Sliding-window rate limiting.
//!
//! # Responsibilities
//! - Define the [`Strategy`] capability the pipeline calls per request
//! - Count distinct events per key within the trailing window
//!
//! # Design Decisions
//! - The strategy is a trait object so the store can be swapped without
//!   touching the pipeline: Redis in production, an in-process window
//!   for tests and store-less deployments
//! - Scores are millisecond timestamps; members are fresh UUIDs, so
//!   concurrent inserts at the same instant never collide

mod memory;
mod sorted_set;

pub use memory::InMemoryStrategy;
pub use sorted_set::SortedSetStrategy;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// One admission question: has `key` exceeded `limit` events within the
/// trailing `duration`?
#[derive(Debug, Clone)]
pub struct RateRequest {
    pub key: String,
    pub limit: u64,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateState {
    Deny,
    Allow,
}

impl RateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deny => "Deny",
            Self::Allow => "Allow",
        }
    }
}

/// The verdict plus the telemetry the response headers carry.
#[derive(Debug, Clone)]
pub struct RateDecision {
    pub state: RateState,
    pub expires_at: DateTime<Utc>,
    pub total_requests: u64,
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("rate limit store: {0}")]
    Store(#[from] redis::RedisError),
}

/// A sliding-window admission strategy over some keyed store.
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn run(&self, request: RateRequest) -> Result<RateDecision, StrategyError>;
}
