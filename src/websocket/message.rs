//! Message-level view of WebSocket traffic.
//!
//! # Responsibilities
//! - Convert data frames to application messages (text is UTF-8 checked)
//! - Convert application messages back to single, final frames
//! - Collapse fragmented data frames into one frame before conversion
//!
//! # Design Decisions
//! - Control frames never become messages
//! - Outbound messages are never fragmented

use bytes::{Bytes, BytesMut};

use crate::websocket::error::WebSocketError;
use crate::websocket::frame::{Frame, Opcode};

/// Application-visible WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Data(Bytes),
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn data(data: impl Into<Bytes>) -> Self {
        Self::Data(data.into())
    }
}

/// Convert a frame into a message.
///
/// Text frames must carry valid UTF-8. Ping, pong, close and bare
/// continuation frames produce no message.
pub fn make_message(frame: &Frame) -> Result<Option<Message>, WebSocketError> {
    match frame.opcode {
        Opcode::Text => {
            let text = std::str::from_utf8(&frame.payload).map_err(|_| WebSocketError::InvalidUtf8)?;
            Ok(Some(Message::Text(text.to_owned())))
        }
        Opcode::Binary => Ok(Some(Message::Data(frame.payload.clone()))),
        Opcode::Continuation | Opcode::Close | Opcode::Ping | Opcode::Pong => Ok(None),
    }
}

/// Convert a message into the frames that carry it.
pub fn make_frames(message: Message) -> Vec<Frame> {
    match message {
        Message::Text(text) => vec![Frame::text(text)],
        Message::Data(data) => vec![Frame::binary(data)],
    }
}

/// Joins a fragmented data message back into one final frame.
#[derive(Debug)]
pub struct Reassembler {
    max_message_bytes: usize,
    pending: Option<(Opcode, BytesMut)>,
}

impl Reassembler {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            max_message_bytes,
            pending: None,
        }
    }

    /// Feed one frame.
    ///
    /// Control frames and unfragmented data frames pass straight through.
    /// Fragments are buffered and `None` is returned until the final one
    /// arrives.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Frame>, WebSocketError> {
        if frame.opcode.is_control() {
            return Ok(Some(frame));
        }

        match (frame.opcode, self.pending.take()) {
            (Opcode::Continuation, None) => Err(WebSocketError::Fragmentation(
                "continuation without a message in progress",
            )),
            (Opcode::Continuation, Some((opcode, mut buffer))) => {
                let size = buffer.len() + frame.payload.len();
                if size > self.max_message_bytes {
                    return Err(WebSocketError::MessageTooLarge {
                        size,
                        limit: self.max_message_bytes,
                    });
                }
                buffer.extend_from_slice(&frame.payload);
                if frame.fin {
                    Ok(Some(Frame::new(true, opcode, buffer.freeze())))
                } else {
                    self.pending = Some((opcode, buffer));
                    Ok(None)
                }
            }
            (_, Some(_)) => Err(WebSocketError::Fragmentation(
                "new data frame while a message is in progress",
            )),
            (opcode, None) => {
                if frame.fin {
                    return Ok(Some(frame));
                }
                if frame.payload.len() > self.max_message_bytes {
                    return Err(WebSocketError::MessageTooLarge {
                        size: frame.payload.len(),
                        limit: self.max_message_bytes,
                    });
                }
                self.pending = Some((opcode, BytesMut::from(&frame.payload[..])));
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_create_expected_messages() {
        assert_eq!(
            make_message(&Frame::text("Hello")).unwrap(),
            Some(Message::text("Hello"))
        );
        assert!(matches!(
            make_message(&Frame::new(true, Opcode::Text, vec![0x03, 0xE8])),
            Err(WebSocketError::InvalidUtf8)
        ));
        assert_eq!(
            make_message(&Frame::binary(vec![0x01, 0x02])).unwrap(),
            Some(Message::data(vec![0x01, 0x02]))
        );
        assert_eq!(make_message(&Frame::ping(Bytes::new())).unwrap(), None);
        assert_eq!(make_message(&Frame::pong(Bytes::new())).unwrap(), None);
        assert_eq!(
            make_message(&Frame::new(true, Opcode::Close, Bytes::new())).unwrap(),
            None
        );
    }

    #[test]
    fn messages_create_expected_frames() {
        assert_eq!(
            make_frames(Message::text("Jack of Hearts")),
            vec![Frame::new(true, Opcode::Text, &b"Jack of Hearts"[..])]
        );
        assert_eq!(
            make_frames(Message::data(vec![0x01, 0x02])),
            vec![Frame::new(true, Opcode::Binary, vec![0x01, 0x02])]
        );
    }

    #[test]
    fn reassembles_fragments() {
        let mut reassembler = Reassembler::new(64);
        assert_eq!(
            reassembler
                .push(Frame::new(false, Opcode::Text, &b"Fi"[..]))
                .unwrap(),
            None
        );
        // Control frames may be interleaved with fragments.
        assert_eq!(
            reassembler.push(Frame::ping(Bytes::new())).unwrap(),
            Some(Frame::ping(Bytes::new()))
        );
        assert_eq!(
            reassembler
                .push(Frame::new(false, Opcode::Continuation, &b"s"[..]))
                .unwrap(),
            None
        );
        assert_eq!(
            reassembler
                .push(Frame::new(true, Opcode::Continuation, &b"h"[..]))
                .unwrap(),
            Some(Frame::text("Fish"))
        );
    }

    #[test]
    fn rejects_orphan_continuation() {
        let mut reassembler = Reassembler::new(64);
        assert!(matches!(
            reassembler.push(Frame::new(true, Opcode::Continuation, &b"x"[..])),
            Err(WebSocketError::Fragmentation(_))
        ));
    }

    #[test]
    fn rejects_interleaved_data_frames() {
        let mut reassembler = Reassembler::new(64);
        reassembler
            .push(Frame::new(false, Opcode::Binary, &b"a"[..]))
            .unwrap();
        assert!(matches!(
            reassembler.push(Frame::binary(&b"b"[..])),
            Err(WebSocketError::Fragmentation(_))
        ));
    }

    #[test]
    fn enforces_message_limit() {
        let mut reassembler = Reassembler::new(4);
        reassembler
            .push(Frame::new(false, Opcode::Binary, &b"abc"[..]))
            .unwrap();
        assert!(matches!(
            reassembler.push(Frame::new(true, Opcode::Continuation, &b"de"[..])),
            Err(WebSocketError::MessageTooLarge { size: 5, limit: 4 })
        ));
    }
}
