//! WebSocket frame model (RFC 6455 §5).
//!
//! A [`Frame`] is always held unmasked; masking only exists on the wire and
//! is applied or removed by the codec.

use bytes::{BufMut, Bytes, BytesMut};

use crate::websocket::error::WebSocketError;

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    /// Parse the low nibble of the first header byte.
    pub fn from_u8(value: u8) -> Result<Self, WebSocketError> {
        match value & 0x0F {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(WebSocketError::InvalidOpcode(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
        }
    }

    /// Close, ping and pong are control frames.
    pub fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }
}

/// Close status code (RFC 6455 §7.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000
    Normal,
    /// 1001
    GoingAway,
    /// 1002
    ProtocolError,
    /// 1003
    UnsupportedData,
    /// 1007
    InvalidPayload,
    /// 1008
    PolicyViolation,
    /// 1009
    MessageTooBig,
    /// 1011
    InternalError,
    /// Any other registered or application code.
    Other(u16),
}

impl CloseCode {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::ProtocolError => 1002,
            Self::UnsupportedData => 1003,
            Self::InvalidPayload => 1007,
            Self::PolicyViolation => 1008,
            Self::MessageTooBig => 1009,
            Self::InternalError => 1011,
            Self::Other(code) => code,
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::ProtocolError,
            1003 => Self::UnsupportedData,
            1007 => Self::InvalidPayload,
            1008 => Self::PolicyViolation,
            1009 => Self::MessageTooBig,
            1011 => Self::InternalError,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// One WebSocket protocol unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment of a message.
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(fin: bool, opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(true, Opcode::Text, Bytes::from(text.into()))
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, Opcode::Binary, data)
    }

    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(true, Opcode::Ping, payload)
    }

    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(true, Opcode::Pong, payload)
    }

    /// Close frame carrying a status code and a UTF-8 reason.
    ///
    /// The reason is truncated on a character boundary so the payload stays
    /// within the control frame limit.
    pub fn close(code: CloseCode, reason: &str) -> Self {
        let mut end = reason.len().min(MAX_CONTROL_PAYLOAD - 2);
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        let mut payload = BytesMut::with_capacity(2 + end);
        payload.put_u16(code.as_u16());
        payload.put_slice(&reason.as_bytes()[..end]);
        Self::new(true, Opcode::Close, payload.freeze())
    }

    /// Decode the status code and reason of a close frame.
    ///
    /// Returns `None` for non-close frames and for close frames without a
    /// status code.
    pub fn close_reason(&self) -> Option<(CloseCode, String)> {
        if self.opcode != Opcode::Close || self.payload.len() < 2 {
            return None;
        }
        let code = u16::from_be_bytes([self.payload[0], self.payload[1]]);
        let reason = String::from_utf8_lossy(&self.payload[2..]).into_owned();
        Some((CloseCode::from(code), reason))
    }
}
