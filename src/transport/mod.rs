//! Network transport.
//!
//! [`Transport`] is the seam between the request pipeline and the wire: the
//! pipeline hands it fully-formed request parts and gets back a parsed
//! [`Response`] or a [`TransportError`]. The bundled [`TcpTransport`] speaks
//! plain HTTP/1.1 over a fresh TCP connection per request; TLS and pooling
//! belong to the hosting application's own `Transport` implementation.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::http::{
    Headers, Method, RequestHead,
    response::{Response, ResponseError},
};

/// Maximum size of a complete HTTP response we will buffer before rejecting it (8 MiB).
const MAX_RESPONSE_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per response.
const INITIAL_BUF_SIZE: usize = 4096;

/// Errors produced below the HTTP semantic layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme {scheme:?} (only plain http is built in)")]
    UnsupportedScheme { scheme: String },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(ResponseError),

    #[error("connection closed before a complete response arrived")]
    UnexpectedEof,

    #[error("response exceeds maximum allowed size of {max_bytes} bytes")]
    ResponseTooLarge { max_bytes: usize },
}

/// Everything a transport needs to issue one request.
#[derive(Debug)]
pub struct RequestParts {
    pub method: Method,
    /// Absolute request URL (`http://host[:port]/path?query`).
    pub url: String,
    /// Headers beyond the ones the transport derives itself (`Host`,
    /// `Content-Length`, `Connection`).
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

/// A pluggable way to exchange one request for one response.
///
/// The pipeline treats any error from here as a transient network failure,
/// so an implementation should reserve errors for connection-level problems
/// and return non-2xx statuses as ordinary responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, parts: RequestParts) -> Result<Response, TransportError>;
}

/// Plain-TCP HTTP/1.1 transport, one connection per request.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, parts: RequestParts) -> Result<Response, TransportError> {
        let target = Target::parse(&parts.url)?;
        let addr = format!("{}:{}", target.host, target.port);

        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| TransportError::Connect {
                addr: addr.clone(),
                source: e,
            })?;
        debug!(%addr, method = %parts.method, target = %target.origin_form, "connected");

        let mut head = RequestHead::new(parts.method, target.origin_form)
            .header("Host", target.host_header);
        for (name, value) in parts.headers.iter() {
            head = head.header(name, value);
        }
        if let Some(body) = parts.body {
            head = head.body_bytes(body);
        }

        stream.write_all(&head.into_bytes()).await?;
        stream.flush().await?;

        read_response(&mut stream).await
    }
}

/// Reads one HTTP/1.1 response from the stream.
///
/// Buffers until the headers parse completely, then waits for
/// `Content-Length` bytes of body; without a `Content-Length` the body runs
/// until the server closes the connection.
async fn read_response(stream: &mut TcpStream) -> Result<Response, TransportError> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;
        let eof = bytes_read == 0;

        // Guard against excessively large responses.
        if buf.len() > MAX_RESPONSE_SIZE {
            return Err(TransportError::ResponseTooLarge {
                max_bytes: MAX_RESPONSE_SIZE,
            });
        }

        let (head, body_offset) = match Response::parse(&buf) {
            Ok(pair) => pair,
            Err(ResponseError::Incomplete) => {
                if eof {
                    return Err(TransportError::UnexpectedEof);
                }
                // Headers not yet fully received — read more data.
                continue;
            }
            Err(e) => return Err(TransportError::MalformedResponse(e)),
        };

        match head.content_length() {
            Some(content_length) => {
                let total_needed = body_offset + content_length;
                if buf.len() < total_needed {
                    if eof {
                        return Err(TransportError::UnexpectedEof);
                    }
                    continue;
                }
                let body = Bytes::copy_from_slice(&buf[body_offset..total_needed]);
                return Ok(Response::from_parts(
                    head.status(),
                    head.headers().clone(),
                    body,
                ));
            }
            None => {
                // No Content-Length: the body runs until the peer closes.
                if eof {
                    return Ok(head);
                }
            }
        }
    }
}

#[derive(Debug)]
struct Target {
    host: String,
    port: u16,
    /// `Host` header value: bare host on port 80, `host:port` otherwise.
    host_header: String,
    /// Origin-form request target: path plus optional query string.
    origin_form: String,
}

impl Target {
    fn parse(url: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" => {}
            other => {
                return Err(TransportError::UnsupportedScheme {
                    scheme: other.to_owned(),
                });
            }
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| TransportError::InvalidUrl {
                url: url.to_owned(),
                reason: "missing host".to_owned(),
            })?
            .to_owned();
        let port = parsed.port().unwrap_or(80);

        let host_header = if port == 80 {
            host.clone()
        } else {
            format!("{host}:{port}")
        };

        let origin_form = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_owned(),
        };

        Ok(Self {
            host,
            port,
            host_header,
            origin_form,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_defaults_to_port_80() {
        let t = Target::parse("http://api.example.com/v1/items").unwrap();
        assert_eq!(t.host, "api.example.com");
        assert_eq!(t.port, 80);
        assert_eq!(t.host_header, "api.example.com");
        assert_eq!(t.origin_form, "/v1/items");
    }

    #[test]
    fn target_keeps_explicit_port_and_query() {
        let t = Target::parse("http://localhost:8080/v1/items?page=2").unwrap();
        assert_eq!(t.port, 8080);
        assert_eq!(t.host_header, "localhost:8080");
        assert_eq!(t.origin_form, "/v1/items?page=2");
    }

    #[test]
    fn bare_host_gets_root_path() {
        let t = Target::parse("http://localhost:9000").unwrap();
        assert_eq!(t.origin_form, "/");
    }

    #[test]
    fn https_is_rejected() {
        let err = Target::parse("https://api.example.com/v1").unwrap_err();
        assert!(matches!(
            err,
            TransportError::UnsupportedScheme { scheme } if scheme == "https"
        ));
    }

    #[test]
    fn garbage_url_is_rejected() {
        assert!(matches!(
            Target::parse("not a url"),
            Err(TransportError::InvalidUrl { .. })
        ));
    }
}
