//! Process settings.
//!
//! Everything outside the route document: bind addresses, timeouts and
//! dependency endpoints. Flags take precedence over the `API_GATEWAY_*`
//! environment.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "api-gateway", about = "Prefix-routed HTTP reverse proxy")]
pub struct Settings {
    /// Public listener for dispatched traffic.
    #[arg(long, env = "API_GATEWAY_ADDRESS", default_value = "0.0.0.0:8080")]
    pub address: SocketAddr,

    /// Observability listener (/livez, /readyz, /metrics).
    #[arg(
        long,
        env = "API_GATEWAY_OBSERVABILITY_ADDRESS",
        default_value = "0.0.0.0:9090"
    )]
    pub observability_address: SocketAddr,

    /// Name reported by the welcome endpoint.
    #[arg(long, env = "API_GATEWAY_NAME", default_value = "api-gateway")]
    pub api_name: String,

    /// Deadline for reading inbound request headers.
    #[arg(long, env = "API_GATEWAY_READ_HEADER_TIMEOUT", value_parser = humantime::parse_duration, default_value = "5s")]
    pub read_header_timeout: Duration,

    /// How long in-flight requests may drain after a shutdown signal.
    #[arg(long, env = "API_GATEWAY_SHUTDOWN_TIMEOUT", value_parser = humantime::parse_duration, default_value = "30s")]
    pub shutdown_timeout: Duration,

    /// Identity service base URL for opaque-token exchange.
    #[arg(long, env = "API_GATEWAY_IDENTITY_URL")]
    pub identity_url: Option<String>,

    /// Client timeout for identity exchange calls.
    #[arg(long, env = "API_GATEWAY_IDENTITY_TIMEOUT", value_parser = humantime::parse_duration, default_value = "5s")]
    pub identity_timeout: Duration,

    /// Redis URL backing the sliding-window rate limiter. When absent,
    /// rate limiting is disabled globally.
    #[arg(long, env = "API_GATEWAY_RATE_LIMIT_STORE")]
    pub rate_limit_store: Option<String>,

    /// Session cookie consulted when a route reads tokens `from: cookie`.
    #[arg(long, env = "API_GATEWAY_SESSION_COOKIE", default_value = "blue-session")]
    pub session_cookie: String,

    /// Directory scanned by the file secret source.
    #[arg(long, env = "API_GATEWAY_SECRET_DIR", default_value = "/etc/api-gateway")]
    pub secret_dir: String,

    /// Forced response flush cadence for streaming relays. Zero keeps the
    /// default discipline (flush per write for event streams and unknown
    /// lengths, none otherwise).
    #[arg(long, env = "API_GATEWAY_FLUSH_INTERVAL", value_parser = humantime::parse_duration, default_value = "0s")]
    pub flush_interval: Duration,
}

impl Settings {
    /// Environment variable holding the YAML route document, resolved
    /// through the secret source chain.
    pub const CONFIG_SECRET: &'static str = "API_GATEWAY_CONFIG";
}
