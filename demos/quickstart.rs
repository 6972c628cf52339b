//! Quick-start demo: spins up an in-process API server, then drives the
//! client pipeline against it.
//!
//! Run with `cargo run --example quickstart`; set `RUST_LOG=reqflow=debug`
//! to watch the cache and retry decisions.

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use reqflow::{Client, ClientConfig};

const CANNED_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: application/json\r\n\
    Cache-Control: max-age=60\r\n\
    X-Api-Version: 2.0.0\r\n\
    Content-Length: 28\r\n\r\n\
    {\"id\":1,\"name\":\"first item\"}";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                let mut seen = Vec::new();
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => seen.extend_from_slice(&chunk[..n]),
                    }
                    if seen.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let _ = stream.write_all(CANNED_RESPONSE.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    let client = Client::new(ClientConfig::new(format!("http://{addr}"), "demo-key"))?;

    let item: Value = client.get("/v1/items/1").await?;
    println!("fetched: {item}");

    // Served from cache: the demo server only ever sees one request.
    let cached: Value = client.get("/v1/items/1").await?;
    println!("cached:  {cached}");

    Ok(())
}
