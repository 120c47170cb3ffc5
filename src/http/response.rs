//! HTTP response model.
//!
//! # Responsibilities
//! - Carry version, status, headers and exactly one payload
//! - Represent the protocol upgrade as a payload variant
//!
//! # Design Decisions
//! - `Payload` is a two-case enum; a response cannot hold both a body and
//!   a WebSocket handler
//! - Handlers are shared behind `Arc` so responses stay cheap to clone

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;

use crate::http::headers::{HeaderName, Headers};
use crate::http::request::Version;
use crate::websocket::handler::WsFrameHandler;

/// Status code and reason phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub phrase: Cow<'static, str>,
}

impl Status {
    pub const SWITCHING_PROTOCOLS: Self = Self::from_static(101, "Switching Protocols");
    pub const OK: Self = Self::from_static(200, "OK");
    pub const NO_CONTENT: Self = Self::from_static(204, "No Content");
    pub const BAD_REQUEST: Self = Self::from_static(400, "Bad Request");
    pub const NOT_FOUND: Self = Self::from_static(404, "Not Found");
    pub const METHOD_NOT_ALLOWED: Self = Self::from_static(405, "Method Not Allowed");
    pub const PAYLOAD_TOO_LARGE: Self = Self::from_static(413, "Payload Too Large");
    pub const UPGRADE_REQUIRED: Self = Self::from_static(426, "Upgrade Required");
    pub const INTERNAL_SERVER_ERROR: Self = Self::from_static(500, "Internal Server Error");

    pub const fn from_static(code: u16, phrase: &'static str) -> Self {
        Self {
            code,
            phrase: Cow::Borrowed(phrase),
        }
    }

    pub fn new(code: u16, phrase: impl Into<String>) -> Self {
        Self {
            code,
            phrase: Cow::Owned(phrase.into()),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.phrase)
    }
}

/// What follows the response head.
#[derive(Clone)]
pub enum Payload {
    /// A complete body.
    Body(Bytes),
    /// Switch the connection to WebSocket framing.
    WebSocket(Arc<dyn WsFrameHandler>),
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Body(body) => f.debug_tuple("Body").field(&body.len()).finish(),
            Self::WebSocket(_) => f.write_str("WebSocket"),
        }
    }
}

/// An HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub version: Version,
    pub status: Status,
    pub headers: Headers,
    pub payload: Payload,
}

impl Response {
    /// A response with an empty body.
    pub fn new(status: Status) -> Self {
        Self {
            version: Version::Http11,
            status,
            headers: Headers::new(),
            payload: Payload::Body(Bytes::new()),
        }
    }

    /// A `101 Switching Protocols` response that hands the connection to `handler`.
    pub fn web_socket(handler: Arc<dyn WsFrameHandler>) -> Self {
        Self {
            version: Version::Http11,
            status: Status::SWITCHING_PROTOCOLS,
            headers: Headers::new(),
            payload: Payload::WebSocket(handler),
        }
    }

    /// Plain text response.
    pub fn text(status: Status, text: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(HeaderName::CONTENT_TYPE, "text/plain; charset=utf-8")
            .with_body(Bytes::from(text.into()))
    }

    pub fn with_header(mut self, name: impl Into<HeaderName>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.payload = Payload::Body(body.into());
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// The body bytes, or `None` for an upgrade.
    pub fn body(&self) -> Option<&Bytes> {
        match &self.payload {
            Payload::Body(body) => Some(body),
            Payload::WebSocket(_) => None,
        }
    }

    pub fn is_upgrade(&self) -> bool {
        matches!(self.payload, Payload::WebSocket(_))
    }
}
