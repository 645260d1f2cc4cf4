//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline → metrics.rs (request counter + duration histogram)
//! startup/shutdown → readiness.rs (atomic readiness flag)
//!
//! Scrapers/probes → server.rs on a separate bind address:
//!     GET /livez   → process is up
//!     GET /readyz  → accepting traffic
//!     GET /metrics → Prometheus exposition
//! ```
//!
//! # Design Decisions
//! - Probes never share the public listener; a wedged data plane should
//!   still answer its scrapers
//! - Metrics are cheap (atomic increments); the readiness flag is the
//!   only process-wide mutable state outside the rate-limit store

pub mod metrics;
pub mod readiness;
pub mod server;

pub use readiness::Readiness;
pub use server::ObservabilityServer;
