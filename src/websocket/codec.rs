//! Frame codec for use with `tokio_util::codec`.
//!
//! # Responsibilities
//! - Parse fin, reserved bits, opcode, mask bit and the 7/16/64-bit length
//! - Unmask inbound payloads
//! - Serialize frames with the minimal length encoding
//!
//! # Design Decisions
//! - The decoder re-reads the header from the buffer until a whole frame is
//!   present, so it keeps no partial-frame state between calls
//! - Masking on the inbound side is accepted but not required
//! - Only the client role masks outbound frames

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::websocket::error::WebSocketError;
use crate::websocket::frame::{Frame, Opcode, MAX_CONTROL_PAYLOAD};

/// Which side of the connection this codec serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Server to client frames are sent unmasked.
    Server,
    /// Client to server frames are masked with a random key.
    Client,
}

/// WebSocket frame encoder/decoder.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    role: Role,
    max_frame_bytes: usize,
}

impl FrameCodec {
    pub fn new(role: Role, max_frame_bytes: usize) -> Self {
        Self {
            role,
            max_frame_bytes,
        }
    }

    pub fn server(max_frame_bytes: usize) -> Self {
        Self::new(Role::Server, max_frame_bytes)
    }

    pub fn client(max_frame_bytes: usize) -> Self {
        Self::new(Role::Client, max_frame_bytes)
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

/// Encode a frame the way a server sends it (unmasked).
pub fn encode_frame(frame: &Frame) -> Bytes {
    let mut dst = BytesMut::with_capacity(frame.payload.len() + 10);
    write_frame(frame, None, &mut dst);
    dst.freeze()
}

fn write_frame(frame: &Frame, mask: Option<[u8; 4]>, dst: &mut BytesMut) {
    let len = frame.payload.len();
    dst.reserve(len + 14);

    let mut first = frame.opcode.as_u8();
    if frame.fin {
        first |= 0x80;
    }
    dst.put_u8(first);

    let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
    if len < 126 {
        dst.put_u8(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        dst.put_u8(mask_bit | 126);
        dst.put_u16(len as u16);
    } else {
        dst.put_u8(mask_bit | 127);
        dst.put_u64(len as u64);
    }

    match mask {
        None => dst.put_slice(&frame.payload),
        Some(key) => {
            dst.put_slice(&key);
            dst.extend(
                frame
                    .payload
                    .iter()
                    .enumerate()
                    .map(|(i, byte)| byte ^ key[i % 4]),
            );
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = WebSocketError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, WebSocketError> {
        if src.len() < 2 {
            return Ok(None);
        }

        let first = src[0];
        let second = src[1];

        if first & 0x70 != 0 {
            return Err(WebSocketError::ReservedBits);
        }
        let fin = first & 0x80 != 0;
        let opcode = Opcode::from_u8(first)?;
        let masked = second & 0x80 != 0;

        let (payload_len, header_len) = match second & 0x7F {
            126 => {
                if src.len() < 4 {
                    return Ok(None);
                }
                (u64::from(u16::from_be_bytes([src[2], src[3]])), 4)
            }
            127 => {
                if src.len() < 10 {
                    return Ok(None);
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&src[2..10]);
                let len = u64::from_be_bytes(raw);
                if len & (1 << 63) != 0 {
                    return Err(WebSocketError::InvalidLength);
                }
                (len, 10)
            }
            short => (u64::from(short), 2),
        };

        if opcode.is_control() {
            if !fin {
                return Err(WebSocketError::ControlFrame("control frames must not be fragmented"));
            }
            if payload_len > MAX_CONTROL_PAYLOAD as u64 {
                return Err(WebSocketError::ControlFrame("control payload exceeds 125 bytes"));
            }
        }
        if payload_len > self.max_frame_bytes as u64 {
            return Err(WebSocketError::FrameTooLarge {
                size: payload_len,
                limit: self.max_frame_bytes,
            });
        }

        let payload_len = payload_len as usize;
        let mask_len = if masked { 4 } else { 0 };
        let frame_len = header_len + mask_len + payload_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(header_len);
        let mask = if masked {
            let mut key = [0u8; 4];
            src.copy_to_slice(&mut key);
            Some(key)
        } else {
            None
        };

        let mut payload = src.split_to(payload_len);
        if let Some(key) = mask {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= key[i % 4];
            }
        }

        Ok(Some(Frame {
            fin,
            opcode,
            payload: payload.freeze(),
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, WebSocketError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(WebSocketError::Truncated),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = WebSocketError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), WebSocketError> {
        let mask = match self.role {
            Role::Server => None,
            Role::Client => Some(rand::random::<[u8; 4]>()),
        };
        write_frame(&frame, mask, dst);
        Ok(())
    }
}
