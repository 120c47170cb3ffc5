//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, host, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → matched route's HttpHandler, or 404
//! ```
//!
//! # Design Decisions
//! - Routes built at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{AndMatcher, HostMatcher, Matcher, MethodMatcher, PathMatcher, PathPrefixMatcher};
pub use router::{Route, Router};
