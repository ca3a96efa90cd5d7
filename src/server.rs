//! Server setup
//!
//! Router construction and the serve loop.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::AppState;

/// Build the service router.
///
/// `/kaithheathcheck` mirrors an upstream platform probe that requests the
/// path with a missing letter; it must answer 200 like the spelled-out
/// aliases.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api::info))
        .route("/health", get(api::health))
        .route("/healthz", get(api::health))
        .route("/kaithhealthcheck", get(api::health))
        .route("/kaithheathcheck", get(api::health))
        .route("/chat", post(api::chat))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("modelgate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
