//! In-process sliding window.
//!
//! Mirrors the sorted-set algorithm over a keyed timestamp list: same
//! fast-path deny, same trim-insert-count admission, same boundary
//! behavior. Used by tests and by deployments without a configured store.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use dashmap::DashMap;

use super::{RateDecision, RateRequest, RateState, Strategy, StrategyError};

#[derive(Default)]
pub struct InMemoryStrategy {
    windows: DashMap<String, Vec<i64>>,
}

impl InMemoryStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Strategy for InMemoryStrategy {
    async fn run(&self, request: RateRequest) -> Result<RateDecision, StrategyError> {
        let now = Utc::now();
        let window = TimeDelta::from_std(request.duration).unwrap_or(TimeDelta::zero());
        let now_ms = now.timestamp_millis();
        let min_ms = (now - window).timestamp_millis();
        let expires_at = now + window;

        // The map entry guard serializes all access to one key, which is
        // the same per-key atomicity the store pipeline provides.
        let mut entry = self.windows.entry(request.key.clone()).or_default();
        let stamps = entry.value_mut();

        let current = stamps.iter().filter(|&&t| t >= min_ms).count() as u64;
        if current >= request.limit {
            return Ok(RateDecision {
                state: RateState::Deny,
                expires_at,
                total_requests: current,
            });
        }

        stamps.retain(|&t| t > min_ms);
        stamps.push(now_ms);
        let total = stamps.len() as u64;

        let state = if total > request.limit {
            RateState::Deny
        } else {
            RateState::Allow
        };

        Ok(RateDecision {
            state,
            expires_at,
            total_requests: total,
        })
    }
}
