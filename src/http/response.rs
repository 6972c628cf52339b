//! HTTP/1.1 response parsing using the [`httparse`] crate.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::{Headers, Status};

/// Errors that can occur while parsing an HTTP/1.1 response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A fully parsed HTTP/1.1 response.
///
/// Created by [`Response::parse`] from a raw byte buffer. The body is stored
/// as a [`Bytes`] buffer.
///
/// # Examples
///
/// ```
/// use reqflow::http::response::Response;
///
/// let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
/// let (response, body_offset) = Response::parse(raw).unwrap();
///
/// assert_eq!(response.status().as_u16(), 200);
/// assert_eq!(response.content_length(), Some(2));
/// assert_eq!(&raw[body_offset..], b"ok");
/// ```
#[derive(Debug)]
pub struct Response {
    status: Status,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Maximum number of headers we support per response.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 response from a byte slice.
    ///
    /// Returns the parsed `Response` and the byte offset at which the body
    /// begins in `buf` (i.e. immediately after the `\r\n\r\n` header
    /// terminator). Everything after the offset is taken as the body; the
    /// caller is responsible for reading until `Content-Length` bytes have
    /// arrived before calling this for the final time.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`] — more data is needed to complete the response headers.
    /// - [`ResponseError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`ResponseError::MissingField`] — a required field (status, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ResponseError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_resp = httparse::Response::new(&mut headers);

        let body_offset = match raw_resp.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        };

        let code = raw_resp
            .code
            .ok_or(ResponseError::MissingField { field: "status" })?;

        let version = raw_resp
            .version
            .ok_or(ResponseError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_resp.headers.len());
        for header in raw_resp.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((
            Self {
                status: Status(code),
                version,
                headers: header_map,
                body,
            },
            body_offset,
        ))
    }

    /// Builds a response directly from its parts. Intended for tests and for
    /// transports that receive already-decoded responses.
    pub fn from_parts(status: Status, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            version: 1,
            headers,
            body: body.into(),
        }
    }

    /// Returns the response status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the response body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }

    /// Deserializes the response body as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_ok() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n";
        let (resp, offset) = Response::parse(raw).unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(resp.version(), 1);
        assert_eq!(resp.headers().get("content-type"), Some("application/json"));
        assert_eq!(offset, raw.len()); // no body
    }

    #[test]
    fn parse_with_body() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nnot found";
        let (resp, body_offset) = Response::parse(raw).unwrap();
        assert_eq!(resp.status().as_u16(), 404);
        assert_eq!(resp.content_length(), Some(9));
        assert_eq!(&raw[body_offset..], b"not found");
        assert_eq!(resp.body().as_ref(), b"not found");
    }

    #[test]
    fn incomplete_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Ty";
        assert!(matches!(
            Response::parse(raw),
            Err(ResponseError::Incomplete)
        ));
    }

    #[test]
    fn malformed_response() {
        let raw = b"NOT-HTTP garbage\r\n\r\n";
        assert!(matches!(Response::parse(raw), Err(ResponseError::Parse(_))));
    }

    #[test]
    fn retry_after_header_survives() {
        let raw = b"HTTP/1.1 429 Too Many Requests\r\nRetry-After: 2\r\n\r\n";
        let (resp, _) = Response::parse(raw).unwrap();
        assert_eq!(resp.headers().get("retry-after"), Some("2"));
    }

    #[test]
    fn json_body() {
        #[derive(serde::Deserialize)]
        struct Item {
            id: u32,
        }

        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n{\"id\":7}\r\n";
        let (resp, _) = Response::parse(raw).unwrap();
        let item: Item = resp.json().unwrap();
        assert_eq!(item.id, 7);
    }
}
