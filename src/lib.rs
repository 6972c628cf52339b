//! # reqflow
//!
//! A from-scratch async HTTP/1.1 API-client pipeline: cache-aware, retrying,
//! with typed errors.
//!
//! Every call runs the same flow: cache lookup for GETs, a bounded retry
//! loop for transient failures (429, 5xx, connection errors), typed
//! classification of everything terminal, and a one-time protocol
//! compatibility check against the server. The HTTP wire layer is built
//! directly on `tokio` and `httparse`; swap in your own [`Transport`] for
//! TLS or pooling.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reqflow::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> reqflow::Result<()> {
//!     let client = Client::new(ClientConfig::new("http://127.0.0.1:8080", "sk-test"))?;
//!
//!     let item: serde_json::Value = client.get("/v1/items/1").await?;
//!     println!("{item}");
//!     Ok(())
//! }
//! ```

// ── Protocol layer ────────────────────────────────────────────────────────────
pub mod http;
pub mod transport;

// ── Pipeline components ───────────────────────────────────────────────────────
pub mod cache;
pub mod client;
pub mod error;
pub mod retry;
pub mod time;
pub mod version;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use client::{Client, ClientConfig, RequestOptions};
pub use error::{ApiError, Result};
pub use http::{Method, Status};
pub use transport::Transport;
