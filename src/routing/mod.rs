//! Route index: configuration tree → immutable longest-prefix matcher.
//!
//! # Responsibilities
//! - Resolve the nested route document into absolute-prefix routes,
//!   applying field-level policy inheritance down the tree
//! - Reject duplicate prefixes and invariant violations at startup
//! - Match request paths by longest targeted prefix, O(|path|)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - A path-segment trie rather than a sorted scan: match cost is
//!   independent of route count
//! - Explicit no-match rather than a silent default route

mod index;
mod trie;

pub use index::{Match, Route, RouteError, RouteIndex};
