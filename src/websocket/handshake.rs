//! RFC 6455 opening handshake.
//!
//! # Responsibilities
//! - Validate an upgrade request
//! - Compute `Sec-WebSocket-Accept`
//! - Build the `101 Switching Protocols` response that carries the handler
//!
//! # Design Decisions
//! - No subprotocol or extension negotiation
//! - An invalid upgrade is answered with `400 Bad Request`, never a 101

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

use crate::http::handler::{HttpHandler, ResponseFuture};
use crate::http::headers::HeaderName;
use crate::http::request::{Method, Request, Version};
use crate::http::response::{Response, Status};
use crate::websocket::error::WebSocketError;
use crate::websocket::handler::WsFrameHandler;

/// GUID appended to the client key (RFC 6455 §1.3).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version accepted.
pub const WS_VERSION: &str = "13";

/// `Sec-WebSocket-Accept` for a client's `Sec-WebSocket-Key`.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.trim().as_bytes());
    hasher.update(WS_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// A fresh random `Sec-WebSocket-Key`, as a client sends it.
pub fn generate_key() -> String {
    STANDARD.encode(rand::random::<[u8; 16]>())
}

/// Check that `request` is a WebSocket upgrade and return its key.
pub fn validate_upgrade(request: &Request) -> Result<&str, WebSocketError> {
    if request.method != Method::GET {
        return Err(handshake("upgrade requires GET"));
    }
    if request.version != Version::Http11 {
        return Err(handshake("upgrade requires HTTP/1.1"));
    }
    if !request.headers.has_token(&HeaderName::UPGRADE, "websocket") {
        return Err(handshake("Upgrade header must contain 'websocket'"));
    }
    if !request.headers.has_token(&HeaderName::CONNECTION, "upgrade") {
        return Err(handshake("Connection header must contain 'upgrade'"));
    }

    match request.header(&HeaderName::SEC_WEBSOCKET_VERSION).map(str::trim) {
        Some(WS_VERSION) => {}
        Some(other) => {
            return Err(handshake(format!("unsupported version {other:?}, expected 13")));
        }
        None => return Err(handshake("missing Sec-WebSocket-Version")),
    }

    let key = request
        .header(&HeaderName::SEC_WEBSOCKET_KEY)
        .map(str::trim)
        .ok_or_else(|| handshake("missing Sec-WebSocket-Key"))?;
    match STANDARD.decode(key) {
        Ok(nonce) if nonce.len() == 16 => Ok(key),
        _ => Err(handshake("Sec-WebSocket-Key must be 16 bytes of base64")),
    }
}

fn handshake(reason: impl Into<String>) -> WebSocketError {
    WebSocketError::Handshake(reason.into())
}

/// The `101` response for a valid upgrade request.
pub fn upgrade_response(
    request: &Request,
    handler: Arc<dyn WsFrameHandler>,
) -> Result<Response, WebSocketError> {
    let key = validate_upgrade(request)?;
    Ok(Response::web_socket(handler)
        .with_header(HeaderName::UPGRADE, "websocket")
        .with_header(HeaderName::CONNECTION, "Upgrade")
        .with_header(HeaderName::SEC_WEBSOCKET_ACCEPT, accept_key(key)))
}

/// Route that upgrades every valid request to a WebSocket served by `H`.
pub struct WebSocketRoute<H> {
    handler: Arc<H>,
}

impl<H: WsFrameHandler> WebSocketRoute<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl<H: WsFrameHandler> HttpHandler for WebSocketRoute<H> {
    fn handle_request(&self, request: Request) -> ResponseFuture<'_> {
        let handler: Arc<dyn WsFrameHandler> = self.handler.clone();
        Box::pin(async move {
            match upgrade_response(&request, handler) {
                Ok(response) => Ok(response),
                Err(e) => {
                    tracing::debug!(path = %request.path, error = %e, "Rejected WebSocket upgrade");
                    Ok(Response::text(Status::BAD_REQUEST, e.to_string())
                        .with_header(HeaderName::SEC_WEBSOCKET_VERSION, WS_VERSION))
                }
            }
        })
    }
}
