//! Decoded HTTP request.
//!
//! # Responsibilities
//! - Hold method, path, query, version, headers and body of one request
//! - Decide whether the connection stays open afterwards
//!
//! # Design Decisions
//! - The path is stored percent-decoded; the encoder re-encodes it
//! - Methods are open tokens, versions are limited to HTTP/1.0 and HTTP/1.1

use std::borrow::Cow;

use bytes::Bytes;

use crate::http::headers::{HeaderName, Headers};

/// Request method token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method(Cow<'static, str>);

impl Method {
    pub const GET: Self = Self(Cow::Borrowed("GET"));
    pub const HEAD: Self = Self(Cow::Borrowed("HEAD"));
    pub const POST: Self = Self(Cow::Borrowed("POST"));
    pub const PUT: Self = Self(Cow::Borrowed("PUT"));
    pub const PATCH: Self = Self(Cow::Borrowed("PATCH"));
    pub const DELETE: Self = Self(Cow::Borrowed("DELETE"));
    pub const OPTIONS: Self = Self(Cow::Borrowed("OPTIONS"));

    pub fn new(token: impl Into<String>) -> Self {
        Self(Cow::Owned(token.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// HTTP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryItem {
    pub name: String,
    pub value: String,
}

impl QueryItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<QueryItem>,
    pub version: Version,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            version: Version::Http11,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_header(mut self, name: impl Into<HeaderName>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(QueryItem::new(name, value));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name)
    }

    /// First value of the named query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value.as_str())
    }

    /// Whether the connection may carry another request after this one.
    ///
    /// HTTP/1.1 defaults to persistent unless `Connection: close` is sent;
    /// HTTP/1.0 only persists with an explicit `Connection: keep-alive`.
    pub fn should_keep_alive(&self) -> bool {
        match self.version {
            Version::Http11 => !self.headers.has_token(&HeaderName::CONNECTION, "close"),
            Version::Http10 => self.headers.has_token(&HeaderName::CONNECTION, "keep-alive"),
        }
    }
}
