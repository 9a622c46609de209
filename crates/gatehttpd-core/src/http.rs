//! HTTP/1.x request-head parser
//!
//! `parse_request` is a pure function over the received bytes. Every field
//! of the result borrows from that buffer; nothing is copied and the buffer
//! is never written.
//!
//! Grammar accepted:
//!
//! ```text
//! GET SP path SP HTTP/<label> CRLF
//! (Field: value CRLF)*
//! CRLF
//! ```
//!
//! Any malformed line break, too many lines, a bad request line or a
//! missing `Host` yields a request with `is_valid == false` and no other
//! data.

use crate::constants::MAX_REQUEST_LINES;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Other,
    Get,
}

/// Version label from the request line. Only recorded, never negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpVersion {
    V10,
    #[default]
    V11,
    V20,
}

impl HttpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::V10 => "HTTP/1.0",
            HttpVersion::V11 => "HTTP/1.1",
            HttpVersion::V20 => "HTTP/2.0",
        }
    }
}

/// Parsed request head, borrowing the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub path: Span<'a>,
    pub version: HttpVersion,
    pub host: Span<'a>,
    /// Token after `Authorization: Basic `
    pub auth: Option<Span<'a>>,
    /// Set only when a non-empty `Host` header was seen
    pub is_valid: bool,
}

impl<'a> HttpRequest<'a> {
    fn invalid() -> Self {
        Self::default()
    }
}

/// Parse the head of an HTTP request held in `buf`.
pub fn parse_request(buf: &[u8]) -> HttpRequest<'_> {
    let mut req = HttpRequest::invalid();
    let mut lines = 0usize;
    let mut bol = 0usize;
    let mut pos = 0usize;

    while pos < buf.len() {
        if buf[pos] != b'\r' {
            pos += 1;
            continue;
        }
        if buf.get(pos + 1) != Some(&b'\n') {
            return HttpRequest::invalid();
        }

        let line = Span::new(&buf[bol..pos]);
        pos += 2;
        bol = pos;
        lines += 1;

        if line.is_empty() {
            break;
        }
        if lines == MAX_REQUEST_LINES {
            return HttpRequest::invalid();
        }

        if lines == 1 {
            if !parse_request_line(line, &mut req) {
                return HttpRequest::invalid();
            }
        } else {
            parse_header(line, &mut req);
        }
    }

    if lines < 2 || !req.is_valid {
        return HttpRequest::invalid();
    }
    req
}

/// Exactly three words separated by runs of spaces, no trailing space.
fn split_request_line(line: Span<'_>) -> Option<[Span<'_>; 3]> {
    let bytes = line.as_bytes();
    let mut words = [Span::EMPTY; 3];
    let mut count = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b' ' {
            i += 1;
            continue;
        }
        if count == 3 {
            return None;
        }
        let start = i;
        while i < bytes.len() && bytes[i] != b' ' {
            i += 1;
        }
        words[count] = Span::new(&bytes[start..i]);
        count += 1;
        if count == 3 && i < bytes.len() {
            // trailing space after the version label
            return None;
        }
    }

    (count == 3).then_some(words)
}

fn parse_request_line<'a>(line: Span<'a>, req: &mut HttpRequest<'a>) -> bool {
    let Some([method, path, version]) = split_request_line(line) else {
        return false;
    };

    if method != "GET" {
        return false;
    }
    let Some(number) = version.after_prefix(b"HTTP/") else {
        return false;
    };

    req.method = Method::Get;
    req.path = path;
    req.version = if number == "1.0" {
        HttpVersion::V10
    } else if number == "2.0" {
        HttpVersion::V20
    } else {
        HttpVersion::V11
    };
    true
}

fn parse_header<'a>(line: Span<'a>, req: &mut HttpRequest<'a>) {
    let Some((field, value)) = line.split_once(b':') else {
        return;
    };
    let value = value.trim_start();

    if field == "Host" {
        if !value.is_empty() {
            req.host = value;
            req.is_valid = true;
        }
    } else if field == "Authorization" {
        if let Some(token) = value.after_prefix(b"Basic ") {
            req.auth = Some(token);
        }
    }
}
