//! WebSocket handler traits and the message-level adapter.
//!
//! # Data Flow
//! ```text
//! inbound frames ──▶ relay_inbound ──▶ application messages ──▶ WsMessageHandler
//!                        │                                          │
//!                   pong / close ack                         outbound messages
//!                        │                                          │
//!                        ▼                                          ▼
//!                   ┌─────────────── outbound frame channel ◀── relay_outbound
//!                   ▼
//!             outbound frames (ends after a close frame)
//! ```
//!
//! # Design Decisions
//! - One required trait at the connection seam: [`WsFrameHandler`]
//! - Message-level handlers are wrapped by [`MessageAdapter`], not inherited
//! - Automatic replies and application messages share one channel, so
//!   they are written in the order they were produced

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use crate::websocket::error::WebSocketError;
use crate::websocket::frame::{CloseCode, Frame, Opcode};
use crate::websocket::message::{make_frames, make_message, Message, Reassembler};

/// Reason sent with the close frame that acknowledges a peer's close.
pub const CLOSE_ACK_REASON: &str = "Goodbye";

/// Default upper bound on a reassembled message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// A boxed future returned by handler methods.
pub type HandlerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, WebSocketError>> + Send + 'a>>;

/// Frames decoded from the peer. Ends on orderly close; a decode error is
/// the last item.
pub type InboundFrames = BoxStream<'static, Result<Frame, WebSocketError>>;

/// Frames to send to the peer, in order.
pub type OutboundFrames = BoxStream<'static, Frame>;

/// A stream of application messages.
pub type MessageStream = BoxStream<'static, Message>;

/// Frame-level WebSocket handler.
///
/// Receives the peer's frames once the upgrade is accepted and returns the
/// frames to send back. The connection writes outbound frames until the
/// returned stream ends.
pub trait WsFrameHandler: Send + Sync + 'static {
    fn make_frames(&self, inbound: InboundFrames) -> HandlerFuture<'_, OutboundFrames>;
}

/// Message-level WebSocket handler.
///
/// Text and binary messages only; control frames are answered by
/// [`MessageAdapter`] before the handler sees anything.
pub trait WsMessageHandler: Send + Sync + 'static {
    fn make_messages(&self, inbound: MessageStream) -> HandlerFuture<'_, MessageStream>;
}

/// Runs a [`WsMessageHandler`] behind the frame-level interface.
#[derive(Debug)]
pub struct MessageAdapter<H> {
    handler: H,
    max_message_bytes: usize,
}

impl<H: WsMessageHandler> MessageAdapter<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    /// Limit the size of messages reassembled from fragments.
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: WsMessageHandler> WsFrameHandler for MessageAdapter<H> {
    fn make_frames(&self, inbound: InboundFrames) -> HandlerFuture<'_, OutboundFrames> {
        Box::pin(async move {
            let (message_tx, message_rx) = mpsc::unbounded_channel();
            let outbound_messages = self
                .handler
                .make_messages(receiver_stream(message_rx))
                .await?;

            let (frame_tx, frame_rx) = mpsc::unbounded_channel();
            tokio::spawn(relay_inbound(
                inbound,
                Reassembler::new(self.max_message_bytes),
                message_tx,
                frame_tx.clone(),
            ));
            tokio::spawn(relay_outbound(outbound_messages, frame_tx));

            Ok(until_close(frame_rx))
        })
    }
}

/// Consume the peer's frames: forward messages, answer pings and closes.
///
/// Stops as soon as nobody reads the outbound frames, releasing the
/// transport's read half.
async fn relay_inbound(
    mut inbound: InboundFrames,
    mut reassembler: Reassembler,
    messages: mpsc::UnboundedSender<Message>,
    frames: mpsc::UnboundedSender<Frame>,
) {
    loop {
        let next = tokio::select! {
            _ = frames.closed() => {
                tracing::debug!("WebSocket outbound closed, dropping inbound");
                return;
            }
            next = inbound.next() => next,
        };
        let Some(next) = next else { break };

        let frame = match next.and_then(|frame| reassembler.push(frame)) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) if e.is_disconnect() => {
                tracing::debug!(error = %e, "WebSocket peer disconnected");
                return;
            }
            Err(e) => {
                fail(&frames, e);
                return;
            }
        };

        match frame.opcode {
            Opcode::Ping => {
                if frames.send(Frame::pong(frame.payload)).is_err() {
                    return;
                }
            }
            Opcode::Pong => {}
            Opcode::Close => {
                tracing::debug!(reason = ?frame.close_reason(), "WebSocket close received");
                let _ = frames.send(Frame::close(CloseCode::Normal, CLOSE_ACK_REASON));
                return;
            }
            _ => match make_message(&frame) {
                Ok(Some(message)) => {
                    // The application may have stopped listening; replies still flow.
                    let _ = messages.send(message);
                }
                Ok(None) => {}
                Err(e) => {
                    fail(&frames, e);
                    return;
                }
            },
        }
    }
    tracing::debug!("WebSocket inbound stream ended");
}

fn fail(frames: &mpsc::UnboundedSender<Frame>, error: WebSocketError) {
    let code = error.close_code();
    tracing::warn!(error = %error, close_code = %code, "Closing WebSocket after invalid frame");
    let _ = frames.send(Frame::close(code, &error.to_string()));
}

/// Forward the application's messages as frames until either side is done.
async fn relay_outbound(mut messages: MessageStream, frames: mpsc::UnboundedSender<Frame>) {
    loop {
        tokio::select! {
            _ = frames.closed() => return,
            next = messages.next() => match next {
                Some(message) => {
                    for frame in make_frames(message) {
                        if frames.send(frame).is_err() {
                            return;
                        }
                    }
                }
                None => return,
            },
        }
    }
}

/// Outbound frames in channel order, ending right after the first close.
fn until_close(rx: mpsc::UnboundedReceiver<Frame>) -> OutboundFrames {
    stream::unfold(Some(rx), |rx| async move {
        let mut rx = rx?;
        let frame = rx.recv().await?;
        let rest = if frame.opcode == Opcode::Close {
            None
        } else {
            Some(rx)
        };
        Some((frame, rest))
    })
    .boxed()
}

fn receiver_stream<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> BoxStream<'static, T> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}
