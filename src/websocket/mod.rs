//! WebSocket subsystem.
//!
//! # Data Flow
//! ```text
//! upgrade request
//!     → handshake.rs (validate, 101 response carrying the handler)
//!     → http::connection switches the byte stream to codec.rs
//!     → handler.rs (frame handler, or message handler via MessageAdapter)
//!     → message.rs (frames ⇄ messages, fragment reassembly)
//! ```
//!
//! # Design Decisions
//! - No extensions: reserved bits are always a protocol error
//! - Control frames are answered below the message layer

pub mod codec;
pub mod error;
pub mod frame;
pub mod handler;
pub mod handshake;
pub mod message;

pub use codec::{encode_frame, FrameCodec, Role};
pub use error::WebSocketError;
pub use frame::{CloseCode, Frame, Opcode};
pub use handler::{
    HandlerFuture, InboundFrames, MessageAdapter, MessageStream, OutboundFrames, WsFrameHandler,
    WsMessageHandler,
};
pub use handshake::{accept_key, upgrade_response, validate_upgrade, WebSocketRoute};
pub use message::{make_frames, make_message, Message};
