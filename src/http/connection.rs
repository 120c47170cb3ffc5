//! One HTTP connection, from first request to protocol switch.
//!
//! # Responsibilities
//! - Split the transport and decode requests from the read half
//! - Write encoded responses to the write half
//! - Switch to WebSocket framing when a response carries a frame handler
//!
//! # Data Flow
//! ```text
//! transport ─split─▶ ReadHalf ──▶ RequestSequence ──▶ requests()
//!               │                     │ take_reader (upgrade)
//!               │                     ▼
//!               │              FramedRead<FrameCodec> ──▶ WsFrameHandler
//!               │                                              │
//!               └──────▶ WriteHalf ◀── handshake, then frames ─┘
//! ```
//!
//! # Design Decisions
//! - The upgrade reuses the request reader's buffer, so frames that arrived
//!   with the upgrade request are not lost
//! - The completion flag is set before the first frame is written; the
//!   request sequence can never decode a frame as a request
//! - The session never closes the transport on its own

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};

use crate::config::{HttpConfig, WebSocketConfig};
use crate::http::decoder::RequestDecoder;
use crate::http::encoder::encode_response;
use crate::http::error::HttpError;
use crate::http::request::Request;
use crate::http::response::{Payload, Response};
use crate::http::sequence::{CompletionFlag, RequestSequence};
use crate::net::{make_identifier, Transport};
use crate::websocket::codec::{encode_frame, FrameCodec};
use crate::websocket::frame::Opcode;
use crate::websocket::handler::{InboundFrames, WsFrameHandler};

/// Server side of one HTTP/1.x connection.
pub struct HttpConnection<T: Transport> {
    identifier: String,
    requests: RequestSequence<ReadHalf<T>>,
    writer: WriteHalf<T>,
    max_frame_bytes: usize,
}

impl<T: Transport> HttpConnection<T> {
    pub fn new(transport: T, http: &HttpConfig, websocket: &WebSocketConfig) -> Self {
        let identifier = make_identifier(&transport);
        let (reader, writer) = tokio::io::split(transport);
        Self {
            identifier,
            requests: RequestSequence::new(
                reader,
                RequestDecoder::from_config(http),
                CompletionFlag::new(),
            ),
            writer,
            max_frame_bytes: websocket.max_frame_bytes,
        }
    }

    /// Peer identifier derived when the connection was created.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The request stream. Ends when the peer leaves, after a
    /// non-keep-alive request, or once the connection switches protocols.
    pub fn requests(&mut self) -> &mut RequestSequence<ReadHalf<T>> {
        &mut self.requests
    }

    pub async fn next_request(&mut self) -> Option<Result<Request, HttpError>> {
        self.requests.next().await
    }

    pub fn completion(&self) -> CompletionFlag {
        self.requests.completion().clone()
    }

    /// Write a response. An upgrade response keeps the connection busy
    /// relaying frames until the handler's outbound stream ends.
    pub async fn send_response(&mut self, response: Response) -> Result<(), HttpError> {
        match &response.payload {
            Payload::Body(_) => {
                self.writer.write_all(&encode_response(&response)).await?;
                self.writer.flush().await?;
                Ok(())
            }
            Payload::WebSocket(handler) => {
                let handler = Arc::clone(handler);
                self.switch_protocols(&response, handler).await
            }
        }
    }

    async fn switch_protocols(
        &mut self,
        response: &Response,
        handler: Arc<dyn WsFrameHandler>,
    ) -> Result<(), HttpError> {
        let reader = self
            .requests
            .take_reader()
            .ok_or(HttpError::UpgradeUnavailable)?;
        let max_frame_bytes = self.max_frame_bytes;
        let inbound: InboundFrames = reader
            .map_decoder(|_| FrameCodec::server(max_frame_bytes))
            .boxed();

        let mut outbound = handler.make_frames(inbound).await?;

        self.writer.write_all(&encode_response(response)).await?;
        self.writer.flush().await?;
        self.requests.completion().set();
        tracing::info!(peer = %self.identifier, "Switched protocols to WebSocket");

        while let Some(frame) = outbound.next().await {
            tracing::trace!(
                peer = %self.identifier,
                opcode = ?frame.opcode,
                len = frame.payload.len(),
                "Writing frame"
            );
            let close = frame.opcode == Opcode::Close;
            self.writer.write_all(&encode_frame(&frame)).await?;
            self.writer.flush().await?;
            if close {
                tracing::debug!(peer = %self.identifier, "WebSocket close sent");
            }
        }

        tracing::debug!(peer = %self.identifier, "WebSocket relay finished");
        Ok(())
    }

    /// Shut down the write half; the peer sees end of stream.
    pub async fn close(&mut self) -> Result<(), HttpError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
