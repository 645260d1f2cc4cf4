//! 101 Switching Protocols bridging.
//!
//! When the backend accepts a protocol switch, both sides of the proxy
//! are taken over: the client connection once the 101 goes out, the
//! backend connection from the transport. Two byte pumps run until
//! either direction ends — client disconnect included — or gateway
//! shutdown fires; dropping the halves closes both sockets.

use axum::body::Body;
use axum::http::{Response, StatusCode};
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::io::BufReader;

use crate::error::GatewayError;
use crate::lifecycle::ShutdownSignal;

use super::headers::upgrade_type;

const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Verify the switch and hand both connections to a background bridge.
/// Returns the 101 response to relay to the client; its headers go out
/// unscrubbed, since `Connection: Upgrade` is the whole point.
pub(crate) fn bridge(
    requested: Option<String>,
    client_upgrade: Option<OnUpgrade>,
    mut response: Response<Incoming>,
    mut shutdown: ShutdownSignal,
) -> Result<Response<Body>, GatewayError> {
    let offered = upgrade_type(response.headers());

    if requested != offered {
        return Err(GatewayError::UpgradeMismatch {
            requested: requested.unwrap_or_default(),
            offered: offered.unwrap_or_default(),
        });
    }

    let Some(client_upgrade) = client_upgrade else {
        return Err(GatewayError::Upstream(
            "client connection cannot switch protocols".into(),
        ));
    };

    let backend_upgrade = hyper::upgrade::on(&mut response);

    tokio::spawn(async move {
        let (client, backend) = match tokio::try_join!(client_upgrade, backend_upgrade) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "protocol switch failed");
                return;
            }
        };

        let client = TokioIo::new(client);
        let backend = TokioIo::new(backend);

        let (client_read, mut client_write) = tokio::io::split(client);
        let (backend_read, mut backend_write) = tokio::io::split(backend);

        let mut client_read = BufReader::with_capacity(COPY_BUFFER_SIZE, client_read);
        let mut backend_read = BufReader::with_capacity(COPY_BUFFER_SIZE, backend_read);

        // Either side finishing tears the whole bridge down, and so does
        // gateway shutdown; dropping the halves closes both sockets.
        tokio::select! {
            result = tokio::io::copy_buf(&mut client_read, &mut backend_write) => {
                if let Err(e) = result {
                    tracing::debug!(error = %e, "client to backend copy ended");
                }
            }
            result = tokio::io::copy_buf(&mut backend_read, &mut client_write) => {
                if let Err(e) = result {
                    tracing::debug!(error = %e, "backend to client copy ended");
                }
            }
            _ = shutdown.triggered() => {
                tracing::debug!("shutdown closed the protocol bridge");
            }
        }
    });

    let mut relayed = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .body(Body::empty())
        .map_err(|e| GatewayError::Upstream(Box::new(e)))?;
    *relayed.headers_mut() = response.headers().clone();

    Ok(relayed)
}
