//! Peer addresses and connection identifiers.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::net::transport::Transport;

/// Identifier used when a peer cannot be named.
pub const UNKNOWN_PEER: &str = "unknown";

/// Address of one end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    Ip(SocketAddr),
    /// Unix domain socket; `None` when the socket is unnamed.
    Unix(Option<PathBuf>),
}

impl PeerAddress {
    /// Display form without port: the IP address, or the socket path.
    pub fn identifier(&self) -> String {
        match self {
            Self::Ip(addr) => addr.ip().to_string(),
            Self::Unix(Some(path)) => path.display().to_string(),
            Self::Unix(None) => UNKNOWN_PEER.to_string(),
        }
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::Ip(addr)
    }
}

#[cfg(unix)]
impl From<tokio::net::unix::SocketAddr> for PeerAddress {
    fn from(addr: tokio::net::unix::SocketAddr) -> Self {
        Self::Unix(addr.as_pathname().map(PathBuf::from))
    }
}

/// Identifier for a connection, computed once when it is accepted.
///
/// IP peers are named by address. Unix peers are usually unnamed, so the
/// listening socket's path names them instead, falling back to the peer's
/// own address when the local one cannot be read.
pub fn make_identifier<T: Transport + ?Sized>(transport: &T) -> String {
    match transport.peer_address() {
        Some(PeerAddress::Ip(addr)) => addr.ip().to_string(),
        Some(peer @ PeerAddress::Unix(_)) => unix_identifier(transport.local_address(), peer),
        None => UNKNOWN_PEER.to_string(),
    }
}

fn unix_identifier(local: Option<PeerAddress>, peer: PeerAddress) -> String {
    local.unwrap_or(peer).identifier()
}
