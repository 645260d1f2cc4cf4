//! Shared outbound transport.

use std::time::Duration;

use axum::body::Body;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
pub(crate) const DEFAULT_MAX_IDLE_PER_HOST: usize = 64;

/// One pooled client shared by every request. The idle timeout bounds how
/// stale a pooled connection can get before it is dropped.
pub(crate) fn build_client() -> Client<HttpConnector, Body> {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(DEFAULT_CONNECT_TIMEOUT));
    connector.set_keepalive(Some(DEFAULT_KEEPALIVE));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(DEFAULT_IDLE_TIMEOUT)
        .pool_max_idle_per_host(DEFAULT_MAX_IDLE_PER_HOST)
        .build(connector)
}
