use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use twirp_lite::server::DispatcherConfig;
use twirp_prototype::haberdasher::{self, Haberdasher};

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Deadline handed to handlers through their context.
const HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    twirp_prototype::init_tracing("info,twirp_lite=debug");

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());

    let config = DispatcherConfig::builder()
        .handler_timeout(HANDLER_TIMEOUT)
        .build();
    let dispatcher = haberdasher::server(Haberdasher, config)?;

    let listener = TcpListener::bind(&addr).await?;
    twirp_prototype::serve(listener, dispatcher).await
}
