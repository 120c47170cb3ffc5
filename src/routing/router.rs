//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store routes in registration order
//! - Dispatch each request to the first matching route
//! - Answer unmatched requests with 404
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan (acceptable for typical route counts)

use std::sync::Arc;

use crate::http::handler::{HttpHandler, ResponseFuture};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, Status};
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, PathMatcher};

/// A matcher paired with the handler it selects.
pub struct Route {
    matcher: Box<dyn Matcher>,
    handler: Arc<dyn HttpHandler>,
}

impl Route {
    pub fn matcher(&self) -> &dyn Matcher {
        self.matcher.as_ref()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route").field("matcher", &self.matcher).finish()
    }
}

/// First-match request router.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route; earlier routes win.
    pub fn route(mut self, matcher: impl Matcher + 'static, handler: impl HttpHandler) -> Self {
        self.routes.push(Route {
            matcher: Box::new(matcher),
            handler: Arc::new(handler),
        });
        self
    }

    /// Route `method path` (exact path) to `handler`.
    pub fn on(self, method: Method, path: &str, handler: impl HttpHandler) -> Self {
        self.route(
            AndMatcher::new(vec![
                Box::new(MethodMatcher::new(method)),
                Box::new(PathMatcher::new(path)),
            ]),
            handler,
        )
    }

    pub fn get(self, path: &str, handler: impl HttpHandler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl HttpHandler) -> Self {
        self.on(Method::POST, path, handler)
    }

    /// The first route matching `request`.
    pub fn find(&self, request: &Request) -> Option<&Route> {
        self.routes.iter().find(|route| route.matcher.matches(request))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl HttpHandler for Router {
    fn handle_request(&self, request: Request) -> ResponseFuture<'_> {
        match self.find(&request) {
            Some(route) => route.handler.handle_request(request),
            None => {
                tracing::debug!(method = %request.method, path = %request.path, "No route matched");
                Box::pin(async move { Ok(Response::text(Status::NOT_FOUND, "Not Found")) })
            }
        }
    }
}
