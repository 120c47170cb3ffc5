//! HTTP/1.x request decoder for use with `tokio_util::codec`.
//!
//! # Responsibilities
//! - Parse the request head with `httparse`
//! - Split the target into a decoded path and query parameters
//! - Frame the body by `Content-Length` or chunked transfer coding
//! - Enforce head and body size limits
//!
//! # Design Decisions
//! - Nothing is consumed from the buffer until a whole request is present
//! - Blank lines between pipelined requests are skipped
//! - A partial request at end of stream counts as a disconnect

use bytes::{Buf, Bytes, BytesMut};
use percent_encoding::percent_decode_str;
use tokio_util::codec::Decoder;
use url::{form_urlencoded, Url};

use crate::config::HttpConfig;
use crate::http::error::HttpError;
use crate::http::headers::{HeaderName, Headers};
use crate::http::request::{Method, QueryItem, Request, Version};

/// Maximum number of header fields in one request.
pub const MAX_HEADERS: usize = 64;

/// Longest accepted chunk-size line.
const MAX_CHUNK_LINE: usize = 1024;

/// Decodes a byte stream into [`Request`] values.
#[derive(Debug, Clone)]
pub struct RequestDecoder {
    max_header_bytes: usize,
    max_body_bytes: usize,
}

impl RequestDecoder {
    pub fn new(max_header_bytes: usize, max_body_bytes: usize) -> Self {
        Self {
            max_header_bytes,
            max_body_bytes,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(config.max_header_bytes, config.max_body_bytes)
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

/// Request head with everything copied out of the read buffer.
struct Head {
    method: Method,
    target: String,
    version: Version,
    headers: Headers,
    len: usize,
}

enum BodyFraming {
    Empty,
    Length(u64),
    Chunked,
}

impl Decoder for RequestDecoder {
    type Item = Request;
    type Error = HttpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>, HttpError> {
        let blank = src
            .iter()
            .take_while(|byte| **byte == b'\r' || **byte == b'\n')
            .count();
        src.advance(blank);
        if src.is_empty() {
            return Ok(None);
        }

        let Some(head) = parse_head(src, self.max_header_bytes)? else {
            return Ok(None);
        };
        let (path, query) = split_target(&head.target)?;

        let body = match body_framing(&head.headers)? {
            BodyFraming::Empty => {
                src.advance(head.len);
                Bytes::new()
            }
            BodyFraming::Length(length) => {
                if length > self.max_body_bytes as u64 {
                    return Err(HttpError::BodyTooLarge {
                        size: length,
                        limit: self.max_body_bytes,
                    });
                }
                let total = head.len + length as usize;
                if src.len() < total {
                    src.reserve(total - src.len());
                    return Ok(None);
                }
                let mut message = src.split_to(total);
                message.split_off(head.len).freeze()
            }
            BodyFraming::Chunked => {
                match parse_chunked(&src[head.len..], self.max_body_bytes)? {
                    Some((body, consumed)) => {
                        src.advance(head.len + consumed);
                        Bytes::from(body)
                    }
                    None => return Ok(None),
                }
            }
        };

        Ok(Some(Request {
            method: head.method,
            path,
            query,
            version: head.version,
            headers: head.headers,
            body,
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Request>, HttpError> {
        match self.decode(src)? {
            Some(request) => Ok(Some(request)),
            None if src.is_empty() => Ok(None),
            None => {
                tracing::debug!(buffered = src.len(), "Stream ended inside a request");
                Err(HttpError::Disconnected)
            }
        }
    }
}

fn parse_head(buf: &[u8], limit: usize) -> Result<Option<Head>, HttpError> {
    let mut fields = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut fields);

    let len = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) if buf.len() > limit => {
            return Err(HttpError::HeadersTooLarge { limit });
        }
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::Version) => {
            return Err(HttpError::UnsupportedVersion(first_line(buf)));
        }
        Err(e) => return Err(HttpError::Malformed(e.to_string())),
    };
    if len > limit {
        return Err(HttpError::HeadersTooLarge { limit });
    }

    let version = match parsed.version {
        Some(0) => Version::Http10,
        Some(1) => Version::Http11,
        other => return Err(HttpError::UnsupportedVersion(format!("{other:?}"))),
    };
    let method = parsed
        .method
        .map(Method::new)
        .ok_or_else(|| HttpError::Malformed("missing method".into()))?;
    let target = parsed
        .path
        .map(str::to_owned)
        .ok_or_else(|| HttpError::Malformed("missing request target".into()))?;

    let mut headers = Headers::new();
    for field in parsed.headers.iter() {
        let value = std::str::from_utf8(field.value)
            .map_err(|_| HttpError::Malformed(format!("header {} is not UTF-8", field.name)))?;
        headers.append(field.name, value.trim());
    }

    Ok(Some(Head {
        method,
        target,
        version,
        headers,
        len,
    }))
}

fn first_line(buf: &[u8]) -> String {
    let end = buf
        .iter()
        .position(|byte| *byte == b'\r' || *byte == b'\n')
        .unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Split a request target into a decoded path and query parameters.
///
/// Accepts origin-form (`/path?query`), absolute-form and `*`.
fn split_target(target: &str) -> Result<(String, Vec<QueryItem>), HttpError> {
    let (raw_path, raw_query) = if target.starts_with("http://") || target.starts_with("https://")
    {
        let url = Url::parse(target)
            .map_err(|e| HttpError::Malformed(format!("invalid request target: {e}")))?;
        (url.path().to_owned(), url.query().map(str::to_owned))
    } else {
        match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        }
    };

    let path = percent_decode_str(&raw_path)
        .decode_utf8()
        .map_err(|_| HttpError::Malformed("request path is not UTF-8".into()))?
        .into_owned();

    let query = raw_query
        .map(|query| {
            form_urlencoded::parse(query.as_bytes())
                .map(|(name, value)| QueryItem::new(name, value))
                .collect()
        })
        .unwrap_or_default();

    Ok((path, query))
}

fn body_framing(headers: &Headers) -> Result<BodyFraming, HttpError> {
    if let Some(coding) = headers.get(&HeaderName::TRANSFER_ENCODING) {
        let coding = coding.trim();
        if coding.eq_ignore_ascii_case("chunked") {
            return Ok(BodyFraming::Chunked);
        }
        if !coding.eq_ignore_ascii_case("identity") {
            return Err(HttpError::UnsupportedTransferEncoding(coding.to_owned()));
        }
    }

    match headers.get(&HeaderName::CONTENT_LENGTH) {
        None => Ok(BodyFraming::Empty),
        Some(value) => {
            let digits = value.trim();
            let invalid = || HttpError::Malformed(format!("invalid Content-Length: {value}"));
            // 1*DIGIT only; `u64::from_str` would also take a leading `+`.
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let length = digits.parse::<u64>().map_err(|_| invalid())?;
            Ok(if length == 0 {
                BodyFraming::Empty
            } else {
                BodyFraming::Length(length)
            })
        }
    }
}

/// Decode a chunked body from the bytes after the head.
///
/// Returns the body and the number of bytes consumed, or `None` if more
/// input is needed. Chunk extensions and trailers are discarded.
fn parse_chunked(buf: &[u8], limit: usize) -> Result<Option<(Vec<u8>, usize)>, HttpError> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let Some(line_len) = find_line(&buf[pos..])? else {
            return Ok(None);
        };
        let line = std::str::from_utf8(&buf[pos..pos + line_len])
            .map_err(|_| HttpError::Malformed("chunk size is not ASCII".into()))?;
        let digits = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(digits, 16)
            .map_err(|_| HttpError::Malformed(format!("invalid chunk size: {digits:?}")))?;
        pos += line_len + 2;

        if size == 0 {
            loop {
                let Some(trailer_len) = find_line(&buf[pos..])? else {
                    return Ok(None);
                };
                pos += trailer_len + 2;
                if trailer_len == 0 {
                    return Ok(Some((body, pos)));
                }
            }
        }

        let total = body.len().saturating_add(size);
        if total > limit {
            return Err(HttpError::BodyTooLarge {
                size: total as u64,
                limit,
            });
        }
        if buf.len() < pos + size + 2 {
            return Ok(None);
        }
        body.extend_from_slice(&buf[pos..pos + size]);
        if &buf[pos + size..pos + size + 2] != b"\r\n" {
            return Err(HttpError::Malformed("chunk is not terminated by CRLF".into()));
        }
        pos += size + 2;
    }
}

/// Length of the next CRLF-terminated line, excluding the CRLF.
fn find_line(buf: &[u8]) -> Result<Option<usize>, HttpError> {
    match buf.windows(2).position(|pair| pair == b"\r\n") {
        Some(len) => Ok(Some(len)),
        None if buf.len() > MAX_CHUNK_LINE => {
            Err(HttpError::Malformed("chunk line too long".into()))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> RequestDecoder {
        RequestDecoder::new(1024, 1024)
    }

    fn decode_one(bytes: &[u8]) -> Result<Option<Request>, HttpError> {
        let mut buf = BytesMut::from(bytes);
        decoder().decode(&mut buf)
    }

    #[test]
    fn decodes_simple_get() {
        let request = decode_one(b"GET /fish HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/fish");
        assert_eq!(request.version, Version::Http11);
        assert_eq!(request.header(&HeaderName::HOST), Some("example.com"));
        assert!(request.body.is_empty());
    }

    #[test]
    fn decodes_path_and_query() {
        let request = decode_one(b"GET /fish%20and%20chips?sauce=salt+%26+vinegar&size=large HTTP/1.1\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.path, "/fish and chips");
        assert_eq!(
            request.query,
            vec![
                QueryItem::new("sauce", "salt & vinegar"),
                QueryItem::new("size", "large"),
            ]
        );
    }

    #[test]
    fn decodes_absolute_form_target() {
        let request = decode_one(b"GET http://example.com/a/b?c=d HTTP/1.1\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.path, "/a/b");
        assert_eq!(request.query_value("c"), Some("d"));
    }

    #[test]
    fn waits_for_complete_head_and_body() {
        let mut decoder = decoder();
        let mut buf = BytesMut::from(&b"POST /echo HTTP/1.1\r\nContent-Le"[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"ngth: 5\r\n\r\nHel");
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"lo");
        let request = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&request.body[..], b"Hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn decodes_pipelined_requests() {
        let mut decoder = decoder();
        let mut buf = BytesMut::from(
            &b"GET /a HTTP/1.1\r\n\r\n\r\nPOST /b HTTP/1.1\r\nContent-Length: 2\r\n\r\nokGET /c HTTP/1.1\r\n"[..],
        );
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap().path, "/a");
        let second = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.path, "/b");
        assert_eq!(&second.body[..], b"ok");
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"GET /c HTTP/1.1\r\n");
    }

    #[test]
    fn decodes_chunked_body() {
        let request = decode_one(
            b"POST /up HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4;ext=1\r\nFish\r\n6\r\n&Chips\r\n0\r\nX-Trailer: yes\r\n\r\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(&request.body[..], b"Fish&Chips");
    }

    #[test]
    fn chunked_body_waits_for_terminator() {
        let mut decoder = decoder();
        let mut buf =
            BytesMut::from(&b"POST /up HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nFish\r\n0\r\n"[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\r\n");
        assert_eq!(&decoder.decode(&mut buf).unwrap().unwrap().body[..], b"Fish");
        assert!(buf.is_empty());
    }

    #[test]
    fn repeated_headers_are_joined() {
        let request = decode_one(b"GET / HTTP/1.1\r\nAccept: a\r\naccept: b\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.header(&HeaderName::new("Accept")), Some("a, b"));
    }

    #[test]
    fn decodes_http_1_0() {
        let request = decode_one(b"GET / HTTP/1.0\r\n\r\n").unwrap().unwrap();
        assert_eq!(request.version, Version::Http10);
        assert!(!request.should_keep_alive());
    }

    #[test]
    fn rejects_malformed_request_line() {
        assert!(matches!(
            decode_one(b"GET\r\n\r\n"),
            Err(HttpError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_oversized_head() {
        let mut bytes = b"GET / HTTP/1.1\r\nX-Pad: ".to_vec();
        bytes.extend(std::iter::repeat(b'a').take(2048));
        assert!(matches!(
            decode_one(&bytes),
            Err(HttpError::HeadersTooLarge { limit: 1024 })
        ));
    }

    #[test]
    fn rejects_oversized_body() {
        assert!(matches!(
            decode_one(b"POST / HTTP/1.1\r\nContent-Length: 4096\r\n\r\n"),
            Err(HttpError::BodyTooLarge { size: 4096, limit: 1024 })
        ));
    }

    #[test]
    fn rejects_unknown_transfer_coding() {
        assert!(matches!(
            decode_one(b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n"),
            Err(HttpError::UnsupportedTransferEncoding(_))
        ));
    }

    #[test]
    fn rejects_invalid_content_length() {
        assert!(matches!(
            decode_one(b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n"),
            Err(HttpError::Malformed(_))
        ));
    }

    #[test]
    fn content_length_must_be_plain_digits() {
        for value in ["+3", "-3", " ", "3 3", "0x3"] {
            let raw = format!("POST / HTTP/1.1\r\nContent-Length: {value}\r\n\r\nabc");
            assert!(
                matches!(decode_one(raw.as_bytes()), Err(HttpError::Malformed(_))),
                "accepted Content-Length {value:?}"
            );
        }
    }

    #[test]
    fn partial_request_at_eof_is_a_disconnect() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHo"[..]);
        let result = decoder().decode_eof(&mut buf);
        assert!(matches!(result, Err(HttpError::Disconnected)));
    }

    #[test]
    fn trailing_blank_lines_at_eof_end_cleanly() {
        let mut buf = BytesMut::from(&b"\r\n\r\n"[..]);
        assert!(decoder().decode_eof(&mut buf).unwrap().is_none());
    }
}
