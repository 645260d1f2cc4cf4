//! The HTTP forwarder.
//!
//! # Data Flow
//! ```text
//! admitted request
//!     → headers.rs (hop-by-hop scrub, X-Forwarded-For fold)
//!     → transport.rs (shared pooled client)
//!     → 101? upgrade.rs (hijack both sides, bridge bytes)
//!     → else relay.rs (streaming body, flush discipline, trailers)
//! ```
//!
//! # Design Decisions
//! - The forwarder never mutates a request after hand-off to the
//!   transport; everything is rewritten up front
//! - Transport failures surface as a bare 502 status, never a body
//! - Mid-stream upstream failures abort the client connection rather
//!   than fabricating a clean end of body

mod headers;
mod relay;
mod transport;
mod upgrade;

pub use relay::LATE_TRAILER_PREFIX;

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, TE, TRAILER, UPGRADE, USER_AGENT};
use axum::http::uri::Uri;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use hyper::upgrade::OnUpgrade;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;

use crate::error::GatewayError;
use crate::lifecycle::ShutdownSignal;
use crate::routing::Match;

use headers::{
    fold_forwarded_for, header_contains_token, remove_connection_headers, remove_hop_headers,
    trailer_names, upgrade_type,
};
use relay::{select_flush_mode, RelayBody};

/// Forwards admitted requests to their matched backend and relays the
/// response. One instance is shared by every request handler; the pooled
/// transport inside is internally concurrent.
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    response_header_timeout: Duration,
    flush_interval: Duration,
    shutdown: ShutdownSignal,
}

impl Forwarder {
    /// `flush_interval` is the configured debounce for streaming relays;
    /// zero keeps the default discipline. The shutdown signal reaches
    /// every protocol bridge this forwarder spawns, so upgraded
    /// connections stop with the rest of the gateway.
    pub fn new(flush_interval: Duration, shutdown: ShutdownSignal) -> Self {
        Self {
            client: transport::build_client(),
            response_header_timeout: transport::DEFAULT_RESPONSE_HEADER_TIMEOUT,
            flush_interval,
            shutdown,
        }
    }

    pub async fn forward(
        &self,
        m: &Match,
        peer: SocketAddr,
        req: Request<Body>,
    ) -> Result<Response<Body>, GatewayError> {
        let (mut parts, mut body) = req.into_parts();

        // Claimed before the request parts are consumed; a later 101 from
        // the backend needs the client side of the upgrade.
        let client_upgrade = parts.extensions.remove::<OnUpgrade>();

        // A declared empty body is replaced outright so the transport may
        // retry the request on a stale pooled connection.
        let declared_len = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if declared_len == Some(0) {
            body = Body::empty();
        }

        let uri = build_target_uri(m, &parts.uri)?;

        let mut headers = std::mem::take(&mut parts.headers);

        let requested_upgrade = upgrade_type(&headers);
        let te_trailers = header_contains_token(&headers, &TE, "trailers");

        remove_connection_headers(&mut headers);
        remove_hop_headers(&mut headers);

        // Re-advertise trailer support only when the client thought it
        // worth mentioning.
        if te_trailers {
            headers.insert(TE, HeaderValue::from_static("trailers"));
        }

        // Scrubbing above also dropped the headers a protocol switch
        // depends on; put the minimal pair back.
        if let Some(upgrade) = &requested_upgrade {
            headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));

            if let Ok(value) = HeaderValue::from_str(upgrade) {
                headers.insert(UPGRADE, value);
            }
        }

        // An absent User-Agent stays absent; the transport's default is
        // suppressed with an empty value.
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_static(""));
        }

        fold_forwarded_for(&mut headers, peer.ip());

        let forwarded_for = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut outbound = Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .body(body)
            .map_err(|e| GatewayError::Upstream(Box::new(e)))?;
        *outbound.headers_mut() = headers;

        let response = match tokio::time::timeout(
            self.response_header_timeout,
            self.client.request(outbound),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(GatewayError::Upstream(Box::new(e))),
            Err(_) => {
                return Err(GatewayError::Upstream(
                    "timed out waiting for response headers".into(),
                ))
            }
        };

        if response.status().is_server_error() {
            tracing::error!(
                method = %parts.method,
                path = %m.path,
                status = %response.status(),
                remote_ip = %forwarded_for,
                "upstream failed"
            );
        }

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            return upgrade::bridge(
                requested_upgrade,
                client_upgrade,
                response,
                self.shutdown.resubscribe(),
            );
        }

        let announced = trailer_names(response.headers());

        let (mut res_parts, res_body) = response.into_parts();

        remove_connection_headers(&mut res_parts.headers);
        remove_hop_headers(&mut res_parts.headers);

        // Pre-announce trailers before the status line goes out.
        if !announced.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&announced.join(", ")) {
                res_parts.headers.insert(TRAILER, value);
            }
        }

        let mode = select_flush_mode(&res_parts.headers, self.flush_interval);
        let relay = RelayBody::new(res_body, announced.len(), mode);

        Ok(Response::from_parts(res_parts, Body::new(relay)))
    }
}

fn build_target_uri(m: &Match, inbound: &Uri) -> Result<Uri, GatewayError> {
    let Some(target) = m.route.target.as_ref() else {
        return Err(GatewayError::Upstream("matched route has no target".into()));
    };

    let authority = match (target.host_str(), target.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(GatewayError::Upstream(
                format!("target {target} has no host").into(),
            ))
        }
    };

    // Merge the target's baked-in query with the request's: either side
    // alone passes through, both join with '&'.
    let target_query = target.query().unwrap_or_default();
    let request_query = inbound.query().unwrap_or_default();

    let query = if target_query.is_empty() || request_query.is_empty() {
        format!("{target_query}{request_query}")
    } else {
        format!("{target_query}&{request_query}")
    };

    let path_and_query = if query.is_empty() {
        m.path.clone()
    } else {
        format!("{}?{}", m.path, query)
    };

    Uri::builder()
        .scheme(target.scheme())
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| GatewayError::Upstream(Box::new(e)))
}
