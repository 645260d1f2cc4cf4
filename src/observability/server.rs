//! Probe and metrics endpoints on the observability listener.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;

use crate::lifecycle::ShutdownSignal;

use super::readiness::Readiness;

#[derive(Clone)]
struct ObservabilityState {
    readiness: Readiness,
    metrics: PrometheusHandle,
}

/// Serves `/livez`, `/readyz` and `/metrics`, bound separately from the
/// public listener.
pub struct ObservabilityServer {
    router: Router,
}

impl ObservabilityServer {
    pub fn new(readiness: Readiness, metrics: PrometheusHandle) -> Self {
        let state = ObservabilityState { readiness, metrics };

        let router = Router::new()
            .route("/livez", get(livez))
            .route("/readyz", get(readyz))
            .route("/metrics", get(render_metrics))
            .with_state(state);

        Self { router }
    }

    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "observability listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.triggered().await })
            .await
    }
}

async fn livez() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn readyz(State(state): State<ObservabilityState>) -> StatusCode {
    if state.readiness.is_ready() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn render_metrics(State(state): State<ObservabilityState>) -> String {
    state.metrics.render()
}
