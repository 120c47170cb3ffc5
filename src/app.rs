//! Built-in routes served by the `switchyard` binary.
//!
//! - `GET /` returns a plain-text banner
//! - `POST /echo` returns the request body
//! - `GET /ws` upgrades to a WebSocket that echoes every message

use bytes::Bytes;

use crate::config::ServerConfig;
use crate::http::handler::{handler_fn, BoxError};
use crate::http::headers::HeaderName;
use crate::http::request::Request;
use crate::http::response::{Response, Status};
use crate::routing::Router;
use crate::websocket::handler::{HandlerFuture, MessageAdapter, MessageStream, WsMessageHandler};
use crate::websocket::handshake::WebSocketRoute;

pub const BANNER: &str = concat!("switchyard ", env!("CARGO_PKG_VERSION"), "\n");

/// Sends every inbound message straight back.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoMessages;

impl WsMessageHandler for EchoMessages {
    fn make_messages(&self, inbound: MessageStream) -> HandlerFuture<'_, MessageStream> {
        Box::pin(async move { Ok(inbound) })
    }
}

async fn banner(_request: Request) -> Result<Response, BoxError> {
    Ok(Response::text(Status::OK, BANNER))
}

async fn echo(request: Request) -> Result<Response, BoxError> {
    let content_type = request
        .header(&HeaderName::CONTENT_TYPE)
        .unwrap_or("application/octet-stream")
        .to_owned();
    Ok(Response::new(Status::OK)
        .with_header(HeaderName::CONTENT_TYPE, content_type)
        .with_body(Bytes::clone(&request.body)))
}

/// Router with the built-in routes.
pub fn router(config: &ServerConfig) -> Router {
    let echo_socket = MessageAdapter::new(EchoMessages)
        .with_max_message_bytes(config.websocket.max_message_bytes);

    Router::new()
        .get("/", handler_fn(banner))
        .post("/echo", handler_fn(echo))
        .get("/ws", WebSocketRoute::new(echo_socket))
}
