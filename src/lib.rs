//! switchyard: an embeddable HTTP/1.x server engine with WebSocket upgrade.
//!
//! Each accepted connection becomes an [`http::HttpConnection`]: a lazy
//! stream of decoded requests plus a response writer. When a handler
//! answers with a WebSocket payload, the same byte stream switches to
//! RFC 6455 framing and is relayed through a [`websocket::WsFrameHandler`]
//! for the rest of its life.

pub mod app;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod websocket;

pub use config::ServerConfig;
pub use http::{HttpConnection, HttpServer};
pub use lifecycle::Shutdown;
