//! Public server: connection loop and graceful drain.
//!
//! Connections are served by hyper's auto (HTTP/1.1 + HTTP/2) builder
//! with protocol-upgrade support, so WebSocket bridging keeps working
//! end to end. Shutdown stops accepting, disables keep-alive on everything
//! in flight, and waits up to a configured deadline before giving up.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::routing::any;
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::lifecycle::ShutdownSignal;

use super::pipeline::{self, AppState};

/// The public-facing HTTP server.
pub struct GatewayServer {
    router: Router,
    read_header_timeout: Duration,
}

impl GatewayServer {
    pub fn new(settings: &Settings, state: AppState) -> Self {
        let router = Router::new()
            .route("/", any(pipeline::dispatch))
            .route("/{*path}", any(pipeline::dispatch))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        Self {
            router,
            read_header_timeout: settings.read_header_timeout,
        }
    }

    /// Accept connections until the shutdown signal fires, then drain
    /// within the signal's deadline.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gateway listening");

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read_header_timeout);
        builder.http2().timer(TokioTimer::new());
        let builder = Arc::new(builder);

        let graceful = GracefulShutdown::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let router = self.router.clone();

                    let service = hyper::service::service_fn(move |mut req: Request<Incoming>| {
                        req.extensions_mut().insert(ConnectInfo::<SocketAddr>(remote));
                        router.clone().oneshot(req.map(Body::new))
                    });

                    let conn = builder
                        .serve_connection_with_upgrades(io, service)
                        .into_owned();
                    let conn = graceful.watch(conn);

                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                _ = shutdown.triggered() => {
                    tracing::info!("gateway stopped accepting connections");
                    break;
                }
            }
        }

        drop(listener);

        if shutdown.drain(graceful.shutdown()).await {
            tracing::info!("in-flight requests drained");
        } else {
            tracing::warn!("drain deadline exceeded, closing remaining connections");
        }

        Ok(())
    }
}
