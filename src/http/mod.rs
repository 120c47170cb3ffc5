//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Transport
//!     → decoder.rs (bytes → Request, limits)
//!     → sequence.rs (lazy request stream, completion flag)
//!     → connection.rs (session: requests in, responses out)
//!     → handler.rs (application seam, e.g. routing::Router)
//!     → encoder.rs (Response → bytes)
//!     → connection.rs writes, or switches to WebSocket framing
//!
//! server.rs drives one connection per task on top of net::Listener.
//! ```

pub mod connection;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod handler;
pub mod headers;
pub mod request;
pub mod response;
pub mod sequence;
pub mod server;

pub use connection::HttpConnection;
pub use decoder::RequestDecoder;
pub use encoder::{encode_request, encode_response};
pub use error::{EncodeError, HttpError};
pub use handler::{handler_fn, BoxError, HttpHandler, ResponseFuture};
pub use headers::{HeaderName, Headers};
pub use request::{Method, QueryItem, Request, Version};
pub use response::{Payload, Response, Status};
pub use sequence::{CompletionFlag, RequestSequence};
pub use server::{serve_connection, HttpServer};
