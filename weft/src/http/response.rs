use chrono::{DateTime, Utc};
use serde_json::Value;

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Value of the `Server` header set on every response.
pub const SERVER: &str = "weft/0.1";

/// An outbound response.
///
/// Headers are kept sorted by name and written in that order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Response {
    /// Creates an empty response with the default headers.
    pub fn new(status: u16) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Server".to_owned(), SERVER.to_owned());
        headers.insert(
            "Content-Type".to_owned(),
            "text/plain; charset=utf-8".to_owned(),
        );

        Self {
            status,
            headers,
            body: Vec::new(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status).with_body(body.into().into_bytes())
    }

    /// A response carrying `body` serialized as JSON.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string().into_bytes())
    }

    pub fn not_found() -> Self {
        Self::text(404, "404 Not Found")
    }

    pub fn method_not_allowed() -> Self {
        Self::text(405, "405 Not Allowed")
    }

    pub fn internal_error() -> Self {
        Self::text(500, "500 Internal Server Error")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Sets the `Date` and `Timestamp` headers from `now`, keeping values a
    /// handler already set.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.headers
            .entry("Date".to_owned())
            .or_insert_with(|| http_date(now));
        self.headers
            .entry("Timestamp".to_owned())
            .or_insert_with(|| now.timestamp().to_string());
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the status line, the sorted headers (with
    /// `Content-Length`), a blank line and the body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));

        let length = self.body.len().to_string();
        let mut headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("content-length"))
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        headers.push(("Content-Length", length.as_str()));
        headers.sort_by(|a, b| a.0.cmp(b.0));

        for (name, value) in headers {
            let _ = write!(head, "{name}: {value}\r\n");
        }

        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Formats `at` as an RFC 7231 `Date` header value.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Returns the reason phrase of a status code.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}
