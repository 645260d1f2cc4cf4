//! Per-route request policies.
//!
//! # Data Flow
//! ```text
//! route document blocks
//!     → authorization.rs / cors.rs / rate_limit.rs (parse + overlay)
//!     → routing::RouteIndex (inheritance + validation at startup)
//!     → http::pipeline (applied per request, in fixed gate order)
//! ```
//!
//! # Design Decisions
//! - Policy values are plain data, immutable after index construction
//! - Authorization inherits per field; CORS and rate limit inherit as
//!   whole blocks with field overlay
//! - All policy parse/validation failures are fatal at startup

pub mod authorization;
pub mod cors;
pub mod rate_limit;

pub use authorization::{Authorization, Policy, TokenSource, Via};
pub use cors::Cors;
pub use rate_limit::RateLimit;

use thiserror::Error;

/// Invariant violations in route policy blocks, fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("authorization via {0:?} is not valid")]
    UnknownVia(String),

    #[error("authorization from {0:?} is not valid")]
    UnknownFrom(String),

    #[error("authorization policy {0:?} is not valid")]
    UnknownPolicy(String),

    #[error("authorization policy cannot be unset")]
    MissingPolicy,

    #[error("authorization from cannot be unset when policy is permitted or enforced")]
    MissingFrom,

    #[error("authorization via cannot be unset when policy is permitted or enforced")]
    MissingVia,

    #[error("origin {0:?} is not valid")]
    InvalidOrigin(String),

    #[error("method {0:?} is not recognized")]
    UnknownMethod(String),

    #[error("no origins allowed in CORS")]
    NoAllowedOrigins,

    #[error("no headers allowed in CORS")]
    NoAllowedHeaders,

    #[error("no methods allowed in CORS")]
    NoAllowedMethods,

    #[error("invalid rate limit")]
    ZeroLimit,

    #[error("invalid rate limit duration")]
    ZeroDuration,
}
