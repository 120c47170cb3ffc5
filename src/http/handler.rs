//! Application seam: turns one request into one response.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::http::request::Request;
use crate::http::response::Response;

/// Error type handlers may return; the server answers it with a 500.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed future resolving to a response.
pub type ResponseFuture<'a> = Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send + 'a>>;

/// Router or application behind a connection.
pub trait HttpHandler: Send + Sync + 'static {
    fn handle_request(&self, request: Request) -> ResponseFuture<'_>;
}

impl<H: HttpHandler + ?Sized> HttpHandler for Arc<H> {
    fn handle_request(&self, request: Request) -> ResponseFuture<'_> {
        (**self).handle_request(request)
    }
}

/// Handler backed by an async closure.
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as an [`HttpHandler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    HandlerFn { f }
}

impl<F, Fut> HttpHandler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    fn handle_request(&self, request: Request) -> ResponseFuture<'_> {
        Box::pin((self.f)(request))
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandlerFn")
    }
}
