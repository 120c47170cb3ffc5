//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, lifecycle tracking)
//!     → transport.rs / address.rs (byte stream + peer identity)
//!     → Hand off to http::connection
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The HTTP engine only sees the `Transport` trait, never a socket type

pub mod address;
pub mod connection;
pub mod listener;
pub mod transport;

pub use address::{make_identifier, PeerAddress};
pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use transport::Transport;
