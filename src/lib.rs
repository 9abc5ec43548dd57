pub mod haberdasher;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use twirp_lite::server::Dispatcher;

/// Install the global tracing subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Serve `dispatcher` on `listener` until Ctrl+C.
pub async fn serve(listener: TcpListener, dispatcher: Dispatcher) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(
        address = %addr,
        service = %dispatcher.descriptor().full_name(),
        routes = ?dispatcher.routes(),
        "Twirp server starting"
    );

    axum::serve(listener, dispatcher.into_router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Twirp server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}
