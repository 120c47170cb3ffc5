//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!       (connection_id, peer, method, path, status, opcode)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or compact)
//! ```
//!
//! # Design Decisions
//! - Structured fields instead of interpolated messages
//! - `RUST_LOG` always wins over the configured level

pub mod logging;

pub use logging::init_logging;
