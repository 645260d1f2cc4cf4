//! Redis sorted-set sliding window.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use redis::aio::ConnectionManager;
use uuid::Uuid;

use super::{RateDecision, RateRequest, RateState, Strategy, StrategyError};

/// Counts requests per key in a Redis sorted set: scores are millisecond
/// timestamps, members are unique ids. Expired entries are trimmed on
/// every insert, so each key's set stays bounded by the request rate.
#[derive(Clone)]
pub struct SortedSetStrategy {
    conn: ConnectionManager,
}

impl SortedSetStrategy {
    /// Connect to the store. Connection failure here is a startup
    /// dependency failure, not a per-request one.
    pub async fn connect(url: &str) -> Result<Self, StrategyError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Strategy for SortedSetStrategy {
    async fn run(&self, request: RateRequest) -> Result<RateDecision, StrategyError> {
        let mut conn = self.conn.clone();

        let now = Utc::now();
        let window = TimeDelta::from_std(request.duration).unwrap_or(TimeDelta::zero());
        let now_ms = now.timestamp_millis();
        let min_ms = (now - window).timestamp_millis();
        let expires_at = now + window;

        // Over the limit already: deny without touching the set.
        let current: u64 = redis::cmd("ZCOUNT")
            .arg(&request.key)
            .arg(min_ms)
            .arg("+inf")
            .query_async(&mut conn)
            .await?;

        if current >= request.limit {
            return Ok(RateDecision {
                state: RateState::Deny,
                expires_at,
                total_requests: current,
            });
        }

        // Trim expired entries, record this request, and re-count — one
        // atomic round trip per admission.
        let (total,): (u64,) = redis::pipe()
            .atomic()
            .zrembyscore(&request.key, 0, min_ms)
            .ignore()
            .zadd(&request.key, Uuid::new_v4().to_string(), now_ms)
            .ignore()
            .zcount(&request.key, "-inf", "+inf")
            .query_async(&mut conn)
            .await?;

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
