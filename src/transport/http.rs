// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal HTTP/1.1 request/response framing (§6), carrying an RPC wire
//! codec's body bytes for JSON-RPC-over-HTTP and XML-RPC. No application
//! semantics beyond `Content-Length`-delimited framing and a keep-alive
//! header — §1's non-goals exclude HTTP semantics beyond request framing,
//! so there is no redirect handling, chunked transfer encoding, or cookie
//! jar here, only enough to carry one request/response body per exchange.

use crate::error::{Error, Result};

pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

pub fn write_request(req: &HttpRequest, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("{} {} HTTP/1.1\r\n", req.method, req.path).as_bytes());
    out.extend_from_slice(b"Host: localhost\r\n");
    out.extend_from_slice(format!("Content-Type: {}\r\n", req.content_type).as_bytes());
    out.extend_from_slice(format!("Content-Length: {}\r\n", req.body.len()).as_bytes());
    out.extend_from_slice(b"Connection: keep-alive\r\n\r\n");
    out.extend_from_slice(&req.body);
}

pub fn write_response(resp: &HttpResponse, out: &mut Vec<u8>) {
    out.extend_from_slice(
        format!("HTTP/1.1 {} {}\r\n", resp.status, reason_phrase(resp.status)).as_bytes(),
    );
    out.extend_from_slice(format!("Content-Type: {}\r\n", resp.content_type).as_bytes());
    out.extend_from_slice(format!("Content-Length: {}\r\n", resp.body.len()).as_bytes());
    out.extend_from_slice(b"Connection: keep-alive\r\n\r\n");
    out.extend_from_slice(&resp.body);
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

struct Headers {
    content_length: usize,
    content_type: String,
}

fn parse_headers(lines: &[&str]) -> Result<Headers> {
    let mut content_length = None;
    let mut content_type = String::from("application/octet-stream");
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => {
                content_length = Some(value.parse::<usize>().map_err(|_| {
                    Error::Serialization(format!("bad Content-Length {value:?}"))
                })?);
            }
            "content-type" => content_type = value.to_string(),
            _ => {}
        }
    }
    Ok(Headers {
        content_length: content_length
            .ok_or_else(|| Error::Serialization("missing Content-Length".into()))?,
        content_type,
    })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Attempt to parse one complete HTTP request out of the front of `buf`.
/// Returns `Ok(None)` if the headers or body are not fully buffered yet,
/// matching every other `try_decode`/`try_decode_frame` incremental
/// contract in this crate.
pub fn try_parse_request(buf: &[u8]) -> Result<Option<(HttpRequest, usize)>> {
    let Some(header_end) = find_header_end(buf) else {
        return Ok(None);
    };
    let header_text = std::str::from_utf8(&buf[..header_end])
        .map_err(|e| Error::Serialization(format!("invalid utf-8 in headers: {e}")))?;
    let mut lines = header_text.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| Error::Serialization("empty HTTP request".into()))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| Error::Serialization("missing HTTP method".into()))?
        .to_string();
    let path = parts
        .next()
        .ok_or_else(|| Error::Serialization("missing HTTP path".into()))?
        .to_string();
    let header_lines: Vec<&str> = lines.collect();
    let headers = parse_headers(&header_lines)?;
    let body_start = header_end + 4;
    let body_end = body_start + headers.content_length;
    if buf.len() < body_end {
        return Ok(None);
    }
    Ok(Some((
        HttpRequest {
            method,
            path,
            content_type: headers.content_type,
            body: buf[body_start..body_end].to_vec(),
        },
        body_end,
    )))
}

/// Symmetric response parser, used by the client side of an HTTP-framed
/// transport.
pub fn try_parse_response(buf: &[u8]) -> Result<Option<(HttpResponse, usize)>> {
    let Some(header_end) = find_header_end(buf) else {
        return Ok(None);
    };
    let header_text = std::str::from_utf8(&buf[..header_end])
        .map_err(|e| Error::Serialization(format!("invalid utf-8 in headers: {e}")))?;
    let mut lines = header_text.split("\r\n");
    let status_line = lines
        .next()
        .ok_or_else(|| Error::Serialization("empty HTTP response".into()))?;
    let mut parts = status_line.split_whitespace();
    let _version = parts.next();
    let status: u16 = parts
        .next()
        .ok_or_else(|| Error::Serialization("missing HTTP status code".into()))?
        .parse()
        .map_err(|_| Error::Serialization("bad HTTP status code".into()))?;
    let header_lines: Vec<&str> = lines.collect();
    let headers = parse_headers(&header_lines)?;
    let body_start = header_end + 4;
    let body_end = body_start + headers.content_length;
    if buf.len() < body_end {
        return Ok(None);
    }
    Ok(Some((
        HttpResponse {
            status,
            content_type: headers.content_type,
            body: buf[body_start..body_end].to_vec(),
        },
        body_end,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let req = HttpRequest {
            method: "POST".into(),
            path: "/rpc".into(),
            content_type: "application/json".into(),
            body: b"{}".to_vec(),
        };
        let mut bytes = Vec::new();
        write_request(&req, &mut bytes);
        let (parsed, consumed) = try_parse_request(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.method, "POST");
        assert_eq!(parsed.path, "/rpc");
        assert_eq!(parsed.body, b"{}");
    }

    #[test]
    fn response_round_trips() {
        let resp = HttpResponse {
            status: 200,
            content_type: "text/xml".into(),
            body: b"<methodResponse/>".to_vec(),
        };
        let mut bytes = Vec::new();
        write_response(&resp, &mut bytes);
        let (parsed, consumed) = try_parse_response(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.content_type, "text/xml");
    }

    #[test]
    fn incomplete_body_reports_none_rather_than_error() {
        let bytes = b"POST /rpc HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        assert!(try_parse_request(bytes).unwrap().is_none());
    }
}
