//! Route matching logic.
//!
//! # Responsibilities
//! - Match host header (exact match, case-insensitive)
//! - Match method, exact path and path prefix (case-sensitive)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - Path matching is case-sensitive and runs on the decoded path
//! - No regex to guarantee O(n) matching

use crate::http::headers::HeaderName;
use crate::http::request::{Method, Request};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request) -> bool;
}

/// Matches the Host header, ignoring any port.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.header(&HeaderName::HOST)
            .map(|host| host.rsplit_once(':').map_or(host, |(name, _)| name))
            .map(|host| host.eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.method == self.method
    }
}

/// Matches one exact path.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    path: String,
}

impl PathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.path == self.path
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.path.starts_with(&self.prefix)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request) -> bool {
        // All matchers must pass (AND)
        self.matchers.iter().all(|m| m.matches(req))
    }
}
