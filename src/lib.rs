//! Prefix-routed HTTP reverse proxy.
//!
//! Sits between a public L7 load balancer and private backends. Incoming
//! requests walk a hierarchical prefix route table; the matched route
//! names a backend, a rewrite rule and three request policies — rate
//! limiting, CORS and authorization — applied in that order before the
//! request is forwarded with hop-by-hop headers stripped and identity
//! propagated as a bearer header. Responses stream back, including
//! server-sent events, trailers and 101 protocol upgrades.
//!
//! # Architecture Overview
//! ```text
//!                  ┌────────────────────────────────────────────────┐
//!                  │                  API GATEWAY                    │
//!  Client          │  ┌──────┐   ┌─────────┐   ┌──────────────────┐ │
//!  ────────────────┼─▶│ http │──▶│ routing │──▶│ security gates   │ │
//!                  │  └──────┘   └─────────┘   │ rate→cors→authz  │ │
//!                  │                           └────────┬─────────┘ │
//!                  │       ┌───────────┐                ▼           │
//!                  │       │ ratelimit │◀──┐   ┌──────────────────┐ │
//!  Client          │       └───────────┘   │   │      proxy       │─┼──▶ Backend
//!  ◀───────────────┼────────────────────── ┴───│  (forwarder)     │ │
//!                  │  ┌──────────┐  ┌────────┐ └──────────────────┘ │
//!                  │  │ identity │  │ config │  ┌────────────────┐  │
//!                  │  └──────────┘  └────────┘  │ observability  │  │
//!                  │  ┌───────────┐ ┌────────┐  └────────────────┘  │
//!                  │  │ lifecycle │ │ secret │                      │
//!                  │  └───────────┘ └────────┘                      │
//!                  └────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod proxy;
pub mod routing;
pub mod security;

// Request policies and their dependencies
pub mod identity;
pub mod ratelimit;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod secret;

pub use config::Settings;
pub use error::GatewayError;
pub use http::{AppState, GatewayServer};
pub use lifecycle::Shutdown;
pub use routing::RouteIndex;
