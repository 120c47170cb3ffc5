//! HTTP/1.x message rendering.
//!
//! # Responsibilities
//! - Render a response head and body to bytes
//! - Render a request head and body to bytes (percent-encoding the target)
//!
//! # Design Decisions
//! - Pure functions: no I/O, same input always renders the same bytes
//! - Responses get an implicit `Content-Length` unless they declare a
//!   `Transfer-Encoding` or switch protocols
//! - Requests always get `Content-Length`, overriding any caller value

use bytes::{BufMut, Bytes, BytesMut};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::form_urlencoded;

use crate::http::error::EncodeError;
use crate::http::headers::{HeaderName, Headers};
use crate::http::request::Request;
use crate::http::response::{Payload, Response};

/// Bytes escaped in a path segment sequence.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Status line followed by one line per header.
pub fn response_header_lines(response: &Response) -> Vec<String> {
    let status = format!(
        "{} {} {}",
        response.version, response.status.code, response.status.phrase
    );

    let mut headers = response.headers.clone();
    if let Payload::Body(body) = &response.payload {
        if !headers.contains(&HeaderName::TRANSFER_ENCODING) {
            headers.insert(HeaderName::CONTENT_LENGTH, body.len().to_string());
        }
    }

    std::iter::once(status).chain(header_lines(&headers)).collect()
}

/// Render a response. Upgrades render the head only.
pub fn encode_response(response: &Response) -> Bytes {
    let body = response.body().map(|body| &body[..]);
    render(response_header_lines(response), body)
}

/// Request line followed by one line per header.
pub fn request_header_lines(request: &Request) -> Result<Vec<String>, EncodeError> {
    let status = format!(
        "{} {} {}",
        request.method,
        percent_encoded_target(request)?,
        request.version
    );

    let mut headers = request.headers.clone();
    headers.insert(HeaderName::CONTENT_LENGTH, request.body.len().to_string());

    Ok(std::iter::once(status).chain(header_lines(&headers)).collect())
}

/// Render a request, failing only if its target cannot be encoded.
pub fn encode_request(request: &Request) -> Result<Bytes, EncodeError> {
    let lines = request_header_lines(request)?;
    Ok(render(lines, Some(&request.body[..])))
}

/// The percent-encoded path, plus `?query` when there are parameters.
pub fn percent_encoded_target(request: &Request) -> Result<String, EncodeError> {
    if request.path != "*" && !request.path.starts_with('/') {
        return Err(EncodeError::InvalidTarget(request.path.clone()));
    }

    let path = utf8_percent_encode(&request.path, PATH).to_string();
    if request.query.is_empty() {
        return Ok(path);
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(request.query.iter().map(|item| (&item.name, &item.value)))
        .finish();
    Ok(format!("{path}?{query}"))
}

fn header_lines(headers: &Headers) -> impl Iterator<Item = String> + '_ {
    headers.iter().map(|(name, value)| format!("{name}: {value}"))
}

fn render(lines: Vec<String>, body: Option<&[u8]>) -> Bytes {
    let head_len: usize = lines.iter().map(|line| line.len() + 2).sum::<usize>() + 2;
    let mut buf = BytesMut::with_capacity(head_len + body.map_or(0, <[u8]>::len));
    for line in &lines {
        buf.put_slice(line.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b"\r\n");
    if let Some(body) = body {
        buf.put_slice(body);
    }
    buf.freeze()
}
