use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_gateway::config::{ConfigError, Settings};
use api_gateway::http::{AppState, GatewayServer};
use api_gateway::identity::{IdentityClient, IdentityExchanger};
use api_gateway::lifecycle::{signals, Shutdown};
use api_gateway::observability::{self, ObservabilityServer, Readiness};
use api_gateway::proxy::Forwarder;
use api_gateway::ratelimit::{SortedSetStrategy, Strategy};
use api_gateway::routing::RouteIndex;
use api_gateway::secret::{self, Source};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::parse();

    let metrics = observability::metrics::install_recorder();
    let readiness = Readiness::new();

    // The route document arrives through the secret chain: environment
    // first, then a file mounted under the secret directory.
    let secrets = secret::Chain::new(vec![
        Box::new(secret::EnvSource),
        Box::new(secret::FileSource::new(&settings.secret_dir)),
    ]);

    let document = secrets
        .get(Settings::CONFIG_SECRET)
        .await
        .map_err(ConfigError::Source)?;
    let document = String::from_utf8(document).map_err(ConfigError::Encoding)?;

    let routes = Arc::new(RouteIndex::parse(&document).map_err(ConfigError::Routes)?);

    let limiter: Option<Arc<dyn Strategy>> = match &settings.rate_limit_store {
        Some(url) => {
            let strategy = SortedSetStrategy::connect(url).await?;
            tracing::info!("rate limit store connected");
            Some(Arc::new(strategy))
        }
        None => {
            tracing::info!("no rate limit store configured, rate limiting disabled");
            None
        }
    };

    let identity: Option<Arc<dyn IdentityExchanger>> = match &settings.identity_url {
        Some(url) => Some(Arc::new(IdentityClient::new(
            url.clone(),
            settings.identity_timeout,
        )?)),
        None => None,
    };

    let shutdown = Shutdown::new(settings.shutdown_timeout);

    let state = AppState {
        routes,
        limiter,
        identity,
        forwarder: Arc::new(Forwarder::new(settings.flush_interval, shutdown.subscribe())),
        session_cookie: settings.session_cookie.clone().into(),
        welcome: serde_json::json!({ "api": settings.api_name })
            .to_string()
            .into(),
    };

    let observability_listener = TcpListener::bind(settings.observability_address).await?;
    let observability_server = ObservabilityServer::new(readiness.clone(), metrics);
    let observability_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        if let Err(e) = observability_server
            .run(observability_listener, observability_shutdown)
            .await
        {
            tracing::error!(error = %e, "observability server failed");
        }
    });

    let listener = TcpListener::bind(settings.address).await?;
    let server = GatewayServer::new(&settings, state);
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    readiness.mark_ready();
    tracing::info!("gateway ready");

    signals::wait_for_terminate().await;
    tracing::info!("shutdown signal received");

    readiness.mark_draining();
    shutdown.trigger();

    server_task.await??;
    tracing::info!("gateway stopped");

    Ok(())
}
