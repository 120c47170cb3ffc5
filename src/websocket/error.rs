//! WebSocket error taxonomy.

use std::io;

use crate::http::error::is_disconnect_kind;
use crate::websocket::frame::CloseCode;

/// Errors raised while decoding, validating or relaying WebSocket frames.
#[derive(Debug, thiserror::Error)]
pub enum WebSocketError {
    #[error("WebSocket I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid opcode: 0x{0:X}")]
    InvalidOpcode(u8),

    #[error("reserved bits set without a negotiated extension")]
    ReservedBits,

    #[error("invalid payload length encoding")]
    InvalidLength,

    #[error("invalid control frame: {0}")]
    ControlFrame(&'static str),

    #[error("frame payload of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: u64, limit: usize },

    #[error("message of {size} bytes exceeds limit of {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("text payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("stream ended inside a frame")]
    Truncated,

    #[error("invalid fragmentation: {0}")]
    Fragmentation(&'static str),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("handler failed: {0}")]
    Handler(String),
}

impl WebSocketError {
    /// Returns true when the error means the peer went away rather than
    /// sending something invalid.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Io(e) => is_disconnect_kind(e.kind()),
            _ => false,
        }
    }

    /// Close code to report to the peer when this error ends a session.
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::InvalidUtf8 => CloseCode::InvalidPayload,
            Self::FrameTooLarge { .. } | Self::MessageTooLarge { .. } => CloseCode::MessageTooBig,
            Self::Io(_) | Self::Handler(_) => CloseCode::InternalError,
            _ => CloseCode::ProtocolError,
        }
    }
}
