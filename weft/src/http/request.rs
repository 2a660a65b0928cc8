use crate::error::HttpError;

use indexmap::IndexMap;
use serde_json::Value;

use std::net::SocketAddr;

/// A parsed inbound request.
#[derive(Clone, Debug)]
pub struct Request {
    /// Upper-cased method, e.g. `GET`.
    pub method: String,

    /// Path without the query string.
    pub path: String,

    pub query: Option<String>,
    pub version: String,

    /// Headers in the order they were received.
    pub headers: IndexMap<String, String>,

    /// Percent-decoded query parameters, followed by the members of a JSON
    /// object body. A body member replaces a query parameter of the same name.
    pub params: IndexMap<String, String>,

    /// Raw bytes after the blank line ending the head.
    pub body: Vec<u8>,

    pub peer: SocketAddr,
}

impl Request {
    /// Parses the bytes received on a connection.
    ///
    /// Without a blank line the whole input is taken as the head and the
    /// body is empty. When `Content-Type` is `application/json` the body
    /// must be a JSON object; its members are merged into `params` (string
    /// members as they are, other values as JSON text).
    pub fn parse(data: &[u8], peer: SocketAddr) -> Result<Self, HttpError> {
        let (head, body) = match find(data, b"\r\n\r\n") {
            Some(idx) => (&data[..idx], &data[idx + 4..]),
            None => (data, &[][..]),
        };

        let head = std::str::from_utf8(head).map_err(|_| HttpError::Encoding)?;
        let mut lines = head.split("\r\n");

        let mut parts = lines.next().unwrap_or_default().split_whitespace();

        let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(HttpError::Malformed("request line"));
        };

        let mut headers = IndexMap::new();

        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or(HttpError::Malformed("header line"))?;

            headers.insert(name.trim().to_owned(), value.trim().to_owned());
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        if path.is_empty() {
            return Err(HttpError::Malformed("empty path"));
        }

        let mut params = IndexMap::new();

        if let Some(query) = query {
            for pair in query.split('&').map(str::trim).filter(|pair| !pair.is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or(HttpError::Malformed("query parameter"))?;

                params.insert(key.to_owned(), percent_decode(value));
            }
        }

        let is_json = headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("content-type") && value.starts_with("application/json")
        });

        if is_json {
            merge_json_body(body, &mut params)?;
        }

        Ok(Self {
            method: method.to_ascii_uppercase(),
            path: path.to_owned(),
            query: query.map(str::to_owned),
            version: version.to_owned(),
            headers,
            params,
            body: body.to_vec(),
            peer,
        })
    }

    /// Looks up a header, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

fn merge_json_body(body: &[u8], params: &mut IndexMap<String, String>) -> Result<(), HttpError> {
    let value: Value = serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(error = %err, "invalid JSON body");
        HttpError::Malformed("json body")
    })?;

    let Value::Object(members) = value else {
        return Err(HttpError::Malformed("json body"));
    };

    for (key, value) in members {
        let value = match value {
            Value::String(text) => text,
            other => other.to_string(),
        };

        params.insert(key, value);
    }

    Ok(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Decodes `%XX` escapes; malformed escapes are kept as they are.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }

        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{Ipv4Addr, SocketAddrV4};

    fn peer() -> SocketAddr {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, 40000).into()
    }

    #[test]
    fn test_parse_request_line_headers_and_body() {
        let data = b"post /items HTTP/1.1\r\n\
            Host: localhost:8080\r\n\
            Content-Type: text/plain\r\n\r\nhello";
        let request = Request::parse(data, peer()).unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/items");
        assert_eq!(request.version, "HTTP/1.1");
        assert_eq!(request.header("host"), Some("localhost:8080"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(request.body, b"hello");
        assert_eq!(request.query, None);
    }

    #[test]
    fn test_parse_query_parameters_are_decoded() {
        let data = b"GET /search?q=hello%20world&lang=en HTTP/1.1\r\n\r\n";
        let request = Request::parse(data, peer()).unwrap();

        assert_eq!(request.path, "/search");
        assert_eq!(request.query.as_deref(), Some("q=hello%20world&lang=en"));
        assert_eq!(request.param("q"), Some("hello world"));
        assert_eq!(request.param("lang"), Some("en"));
    }

    #[test]
    fn test_parse_without_blank_line_has_empty_body() {
        let request = Request::parse(b"GET / HTTP/1.0", peer()).unwrap();

        assert_eq!(request.path, "/");
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert_eq!(
            Request::parse(b"GET\r\n\r\n", peer()).unwrap_err(),
            HttpError::Malformed("request line")
        );
        assert_eq!(
            Request::parse(b"GET / HTTP/1.1\r\nno-colon\r\n\r\n", peer()).unwrap_err(),
            HttpError::Malformed("header line")
        );
        assert_eq!(
            Request::parse(b"GET /?flag HTTP/1.1\r\n\r\n", peer()).unwrap_err(),
            HttpError::Malformed("query parameter")
        );
        assert_eq!(
            Request::parse(b"GET /\xff HTTP/1.1\r\n\r\n", peer()).unwrap_err(),
            HttpError::Encoding
        );
    }

    #[test]
    fn test_parse_merges_json_object_body_into_params() {
        let data = b"POST /items?name=query&page=2 HTTP/1.1\r\n\
            Content-Type: application/json; charset=utf-8\r\n\r\n\
            {\"name\": \"body\", \"count\": 3, \"tags\": [\"a\"], \"none\": null}";
        let request = Request::parse(data, peer()).unwrap();

        assert_eq!(request.param("name"), Some("body"));
        assert_eq!(request.param("page"), Some("2"));
        assert_eq!(request.param("count"), Some("3"));
        assert_eq!(request.param("tags"), Some(r#"["a"]"#));
        assert_eq!(request.param("none"), Some("null"));
    }

    #[test]
    fn test_parse_ignores_json_body_without_json_content_type() {
        let data = b"POST / HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n{\"name\": \"body\"}";
        let request = Request::parse(data, peer()).unwrap();

        assert!(request.params.is_empty());
        assert_eq!(request.body, br#"{"name": "body"}"#);
    }

    #[test]
    fn test_parse_rejects_invalid_json_body() {
        let head = "POST / HTTP/1.1\r\ncontent-type: application/json\r\n\r\n";

        for body in ["{\"name\": ", "[1, 2]", ""] {
            let data = format!("{head}{body}");

            assert_eq!(
                Request::parse(data.as_bytes(), peer()).unwrap_err(),
                HttpError::Malformed("json body"),
                "body {body:?}"
            );
        }
    }

    #[test]
    fn test_percent_decode_keeps_invalid_escapes() {
        assert_eq!(percent_decode("a%2Fb"), "a/b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}
