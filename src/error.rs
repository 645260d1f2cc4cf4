//! Gateway error taxonomy.
//!
//! [`GatewayError`] is the closed set of runtime failures a request can hit
//! after configuration has been validated. Every variant carries a fixed
//! classification and maps to exactly one HTTP status; the pipeline is a
//! translation layer from kind to status and never invents codes ad hoc.
//!
//! Configuration failures are fatal at startup and live in
//! [`crate::config::ConfigError`] and [`crate::routing::RouteError`].

use axum::http::StatusCode;
use thiserror::Error;

/// Broad failure classification, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The client sent something we refuse to serve.
    Client,
    /// The upstream backend failed or misbehaved.
    Upstream,
    /// A gateway dependency (store, identity service) failed.
    Dependency,
}

/// Runtime error kinds surfaced by the request pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// No route in the index matches the request path.
    #[error("no route matches {path:?}")]
    RouteNotFound { path: String },

    /// Authorization is required and was missing or rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// The route policy forbids all requests.
    #[error("forbidden")]
    Forbidden,

    /// A CORS preflight check failed.
    #[error("cross-origin request denied")]
    CorsDenied,

    /// OPTIONS probe on a route without CORS handling.
    #[error("method not allowed")]
    OptionsNotSupported,

    /// The sliding window is full for this key.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The rate-limit key could not be derived from the request.
    #[error("rate limit key: {0}")]
    RateKey(String),

    /// The outbound round trip failed before a response arrived.
    #[error("upstream round trip: {0}")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The backend answered 101 with a different protocol than requested.
    #[error("backend switched to protocol {offered:?} when {requested:?} was requested")]
    UpgradeMismatch { requested: String, offered: String },

    /// The rate-limit store failed mid-request.
    #[error("rate limit store: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The identity service was unreachable while policy demanded it.
    #[error("identity exchange: {0}")]
    IdentityUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl GatewayError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RouteNotFound { .. }
            | Self::Unauthorized
            | Self::Forbidden
            | Self::CorsDenied
            | Self::OptionsNotSupported
            | Self::RateLimited
            | Self::RateKey(_) => ErrorClass::Client,
            Self::Upstream(_) | Self::UpgradeMismatch { .. } => ErrorClass::Upstream,
            Self::Store(_) | Self::IdentityUnavailable(_) => ErrorClass::Dependency,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::CorsDenied => StatusCode::FORBIDDEN,
            Self::OptionsNotSupported => StatusCode::METHOD_NOT_ALLOWED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::RateKey(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::UpgradeMismatch { .. } => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::IdentityUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
