//! HTTP/1.1 request builder.
//!
//! Provides a fluent builder API for constructing outgoing requests and
//! serializing them to a byte buffer for transmission over TCP.

use bytes::{BufMut, BytesMut};

use super::{Headers, Method};

/// An outgoing HTTP/1.1 request, ready to be serialized and sent.
///
/// The request target is the origin-form path plus optional query string
/// (e.g. `/v1/items?page=2`); the `Host` header carries the authority.
///
/// # Examples
///
/// ```
/// use reqflow::http::{Method, RequestHead};
///
/// let request = RequestHead::new(Method::Post, "/v1/items")
///     .header("Host", "api.example.com")
///     .body(r#"{"name":"widget"}"#);
///
/// let bytes = request.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("POST /v1/items HTTP/1.1\r\n"));
/// assert!(text.contains("Content-Length: 17\r\n"));
/// ```
#[derive(Debug)]
pub struct RequestHead {
    method: Method,
    target: String,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl RequestHead {
    /// Creates a new request with the given method and target, and an empty body.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: false,
        }
    }

    /// Appends a request header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the request body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    ///
    /// Defaults to `close`: the transport opens one connection per exchange.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the request target (path plus optional query string).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Serializes the request into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: application/json` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` if the body is non-empty (always the last header).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers.insert("Content-Type", "application/json");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.insert("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Request line
        buf.put(format!("{} {} HTTP/1.1\r\n", self.method.as_str(), self.target).as_bytes());

        // Headers
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        if content_length > 0 {
            buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        }

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        // Body
        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn simple_get_request() {
        let r = RequestHead::new(Method::Get, "/v1/items").header("Host", "localhost");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("GET /v1/items HTTP/1.1\r\n"));
        assert!(s.contains("Host: localhost\r\n"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn post_with_json_body() {
        let r = RequestHead::new(Method::Post, "/v1/items").body(r#"{"a":1}"#);
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("POST /v1/items HTTP/1.1\r\n"));
        assert!(s.contains("Content-Type: application/json\r\n"));
        assert!(s.contains("Content-Length: 7\r\n"));
        assert!(s.ends_with("\r\n\r\n{\"a\":1}"));
    }

    #[test]
    fn explicit_content_type_wins() {
        let r = RequestHead::new(Method::Put, "/upload")
            .header("Content-Type", "application/octet-stream")
            .body_bytes(vec![0u8, 1, 2]);
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Type: application/octet-stream\r\n"));
        assert!(!s.contains("application/json"));
    }

    #[test]
    fn get_has_no_content_length() {
        let r = RequestHead::new(Method::Get, "/");
        let s = to_string(r.into_bytes());
        assert!(!s.contains("Content-Length"));
        assert!(!s.contains("Content-Type"));
    }

    #[test]
    fn connection_close_by_default() {
        let r = RequestHead::new(Method::Get, "/");
        let s = to_string(r.into_bytes());
        assert!(s.contains("Connection: close\r\n"));
    }

    #[test]
    fn query_string_preserved_in_target() {
        let r = RequestHead::new(Method::Get, "/v1/items?page=2&sort=asc");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("GET /v1/items?page=2&sort=asc HTTP/1.1\r\n"));
    }
}
