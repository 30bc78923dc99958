//! HTTP surface: the webhook endpoint and a health check.

use crate::rate::RateTracker;
use crate::webhook;
use atende_agent::ChatApi;
use atende_core::{config::Config, traits::Messenger};
use atende_evolution::Transcriber;
use atende_store::Store;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Everything a webhook turn needs, shared across requests.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub messenger: Arc<dyn Messenger>,
    pub chat: Arc<dyn ChatApi>,
    pub transcriber: Transcriber,
    pub rate: Arc<RateTracker>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook::handle))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.server.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
