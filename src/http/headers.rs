//! Case-insensitive header names and an insertion-ordered header map.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A header field name.
///
/// Comparison, ordering and hashing ignore ASCII case; the spelling the
/// name was created with is the one rendered on the wire.
#[derive(Debug, Clone)]
pub struct HeaderName(Cow<'static, str>);

impl HeaderName {
    pub const CONNECTION: Self = Self::from_static("Connection");
    pub const CONTENT_LENGTH: Self = Self::from_static("Content-Length");
    pub const CONTENT_TYPE: Self = Self::from_static("Content-Type");
    pub const HOST: Self = Self::from_static("Host");
    pub const SEC_WEBSOCKET_ACCEPT: Self = Self::from_static("Sec-WebSocket-Accept");
    pub const SEC_WEBSOCKET_KEY: Self = Self::from_static("Sec-WebSocket-Key");
    pub const SEC_WEBSOCKET_VERSION: Self = Self::from_static("Sec-WebSocket-Version");
    pub const TRANSFER_ENCODING: Self = Self::from_static("Transfer-Encoding");
    pub const UPGRADE: Self = Self::from_static("Upgrade");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for HeaderName {}

impl Hash for HeaderName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        state.write_u8(0xFF);
    }
}

impl PartialOrd for HeaderName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeaderName {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.0.bytes().map(|b| b.to_ascii_lowercase());
        let rhs = other.0.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs)
    }
}

impl From<&str> for HeaderName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for HeaderName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for HeaderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Header map keyed by [`HeaderName`].
///
/// Keeps insertion order so rendered messages are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(HeaderName, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &HeaderName) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    /// Set a header, replacing any existing value in place.
    pub fn insert(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Add a value, joining it to an existing one with `", "`.
    pub fn append(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => {
                entry.1.push_str(", ");
                entry.1.push_str(&value);
            }
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &HeaderName) -> Option<String> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    /// True if the comma-separated header value lists `token` (ASCII case-insensitive).
    pub fn has_token(&self, name: &HeaderName, token: &str) -> bool {
        self.get(name)
            .map(|value| {
                value
                    .split(',')
                    .any(|item| item.trim().eq_ignore_ascii_case(token))
            })
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> {
        self.entries.iter().map(|(key, value)| (key, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<HeaderName>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}
