//! modelgate entry point
//!
//! Loads configuration, runs the boot sequence, then serves HTTP. Boot
//! completes before the listener binds, so every request observes a settled
//! readiness state.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use modelgate::boot;
use modelgate::config::Config;
use modelgate::server;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    tracing::info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let state = Arc::new(boot::boot(&config).await);
    if !state.model_loaded {
        tracing::warn!(
            "Serving in degraded mode: {}",
            state.error.as_deref().unwrap_or("unknown reason")
        );
    }

    server::serve(config.port, state).await
}
