//! Byte-stream transports the HTTP engine can run over.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::net::address::PeerAddress;

/// A bidirectional byte stream with optional endpoint addresses.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    fn peer_address(&self) -> Option<PeerAddress>;
    fn local_address(&self) -> Option<PeerAddress>;
}

impl Transport for tokio::net::TcpStream {
    fn peer_address(&self) -> Option<PeerAddress> {
        self.peer_addr().ok().map(PeerAddress::from)
    }

    fn local_address(&self) -> Option<PeerAddress> {
        self.local_addr().ok().map(PeerAddress::from)
    }
}

#[cfg(unix)]
impl Transport for tokio::net::UnixStream {
    fn peer_address(&self) -> Option<PeerAddress> {
        self.peer_addr().ok().map(PeerAddress::from)
    }

    fn local_address(&self) -> Option<PeerAddress> {
        self.local_addr().ok().map(PeerAddress::from)
    }
}

/// In-memory pipe; neither end has an address.
impl Transport for tokio::io::DuplexStream {
    fn peer_address(&self) -> Option<PeerAddress> {
        None
    }

    fn local_address(&self) -> Option<PeerAddress> {
        None
    }
}
