//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! API_GATEWAY_* environment / flags
//!     → settings.rs (typed Settings)
//!
//! API_GATEWAY_CONFIG (secret source chain)
//!     → schema.rs (YAML route tree, serde)
//!     → routing::RouteIndex (resolved, validated, immutable)
//!     → shared via Arc to all request handlers
//! ```
//!
//! # Design Decisions
//! - Both inputs are read once at startup; changes require a restart
//! - Syntactic validation is serde's job; semantic checks live with the
//!   route index construction
//! - Unknown enum strings in the route document are fatal

pub mod schema;
pub mod settings;

pub use schema::{AuthorizationConfig, CorsConfig, RateLimitConfig, RouteConfig, RouteDocument};
pub use settings::Settings;

use thiserror::Error;

/// Fatal configuration failures; any of these aborts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("route document not available: {0}")]
    Source(#[from] crate::secret::SecretError),

    #[error("route document is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Routes(#[from] crate::routing::RouteError),
}
