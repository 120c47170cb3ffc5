//! HTTP engine errors.

use std::io;

use crate::websocket::error::WebSocketError;

/// Errors raised by the request decoder and the connection session.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request head exceeds {limit} bytes")]
    HeadersTooLarge { limit: usize },

    #[error("request body of {size} bytes exceeds limit of {limit}")]
    BodyTooLarge { size: u64, limit: usize },

    #[error("unsupported HTTP version: {0}")]
    UnsupportedVersion(String),

    #[error("unsupported transfer encoding: {0}")]
    UnsupportedTransferEncoding(String),

    #[error("peer disconnected")]
    Disconnected,

    #[error("connection has already switched protocols")]
    UpgradeUnavailable,

    #[error(transparent)]
    WebSocket(#[from] WebSocketError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl HttpError {
    /// Returns true when the peer went away; such errors end a connection
    /// quietly instead of being reported.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Disconnected => true,
            Self::Io(e) => is_disconnect_kind(e.kind()),
            Self::WebSocket(e) => e.is_disconnect(),
            _ => false,
        }
    }
}

pub(crate) fn is_disconnect_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    )
}

/// Errors raised while rendering a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("request target must be origin-form or '*': {0:?}")]
    InvalidTarget(String),
}
