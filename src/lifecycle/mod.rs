//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! SIGTERM / ctrl-c (signals.rs)
//!     → Shutdown broadcast (shutdown.rs)
//!     → readiness flag cleared
//!     → listeners stop accepting, in-flight requests drain
//!     → forced exit after the drain deadline
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
