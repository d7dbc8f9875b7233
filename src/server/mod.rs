//! JSON HTTP surface over the projection and exchange-rate services.

pub mod handlers;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::core::currency::ExchangeRateService;
use crate::core::projection::ProjectionService;
use handlers::{calculate, client_settings, exchange_rates, health_check, list_assets, prices};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub projections: Arc<ProjectionService>,
    pub exchange_rates: Arc<ExchangeRateService>,
    pub settings: Arc<serde_json::Map<String, serde_json::Value>>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/assets", get(list_assets))
        .route("/api/prices", post(prices))
        .route("/api/calculate", post(calculate))
        .route("/api/exchange-rates", get(exchange_rates))
        .route("/api/settings", get(client_settings))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /api/assets");
    tracing::info!("  POST /api/prices");
    tracing::info!("  POST /api/calculate");
    tracing::info!("  GET  /api/exchange-rates");
    tracing::info!("  GET  /api/settings");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
