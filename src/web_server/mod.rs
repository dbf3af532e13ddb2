//! Router assembly and server startup.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::shared::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(crate::mailroom::router())
        .merge(crate::webhook::router())
        .merge(crate::scan_access::router())
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

pub async fn run_server(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.server.bind_addr();
    let router = build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("mailroom ingestion service listening on {addr}");

    // The webhook authenticator needs the peer address for its allowlist.
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server terminated")?;
    Ok(())
}
