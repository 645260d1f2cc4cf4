//! Public HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper connection loop, graceful drain)
//!     → pipeline.rs (welcome → match → rate → CORS → authz)
//!     → proxy::Forwarder (outbound round trip, response relay)
//! ```
//!
//! # Design Decisions
//! - Gates run in a fixed order and each one answers the client itself;
//!   the pipeline stops at the first terminal outcome
//! - Response decorations (Vary, CORS, rate telemetry) accumulate in a
//!   header map that is applied to whatever response ends the request
//! - No panic surfaces to a client; errors translate through
//!   [`crate::error::GatewayError::status`]

pub mod pipeline;
pub mod server;

pub use pipeline::AppState;
pub use server::GatewayServer;
