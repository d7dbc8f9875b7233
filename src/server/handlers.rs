//! HTTP handlers

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::core::assets::AssetDefinition;
use crate::core::currency::ExchangeRates;
use crate::core::projection::{
    MAX_LOOKBACK_DAYS, ProjectionError, ProjectionRequest, RequestError,
};
use crate::core::series::PriceSeries;
use crate::core::simulator::SimulationResult;
use crate::server::AppState;

const DEFAULT_PRICE_DAYS: u32 = 365;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricesRequest {
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RatesResponse {
    pub success: bool,
    #[serde(flatten)]
    pub rates: ExchangeRates,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Failure returned to HTTP callers: 400 for bad input, 500 for everything else.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error,
                    details: None,
                },
            ),
            ApiError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    details: Some(details),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::Invalid(invalid) => invalid.into(),
            other => {
                tracing::error!(error = %other, "Projection failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Supported assets ordered for display.
pub async fn list_assets(State(state): State<AppState>) -> Json<Vec<AssetDefinition>> {
    Json(state.projections.registry().sorted())
}

/// Client settings from the config file, returned unchanged.
pub async fn client_settings(
    State(state): State<AppState>,
) -> Json<serde_json::Map<String, serde_json::Value>> {
    Json(state.settings.as_ref().clone())
}

pub async fn prices(
    State(state): State<AppState>,
    payload: Result<Json<PricesRequest>, JsonRejection>,
) -> Result<Json<PriceSeries>, ApiError> {
    let Json(payload) = payload?;
    let asset_id = payload
        .asset_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("assetId is required".to_string()))?;
    let asset = state
        .projections
        .registry()
        .find(&asset_id)
        .ok_or(RequestError::UnknownAsset)?
        .clone();

    let days = payload
        .days
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_PRICE_DAYS);
    if days > MAX_LOOKBACK_DAYS {
        return Err(RequestError::LookbackOutOfRange.into());
    }
    let series = state
        .projections
        .price_series(&asset, days)
        .await
        .map_err(|e| {
            tracing::error!(asset = %asset.id, error = %e, "Price fetch failed");
            ApiError::Internal(format!("{e:#}"))
        })?;

    Ok(Json(series))
}

pub async fn calculate(
    State(state): State<AppState>,
    payload: Result<Json<ProjectionRequest>, JsonRejection>,
) -> Result<Json<SimulationResult>, ApiError> {
    let Json(request) = payload?;
    let result = state.projections.project(&request).await?;
    Ok(Json(result))
}

pub async fn exchange_rates(State(state): State<AppState>) -> Response {
    match state.exchange_rates.usd_rates().await {
        Ok(rates) => Json(RatesResponse {
            success: true,
            rates,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch exchange rates");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": format!("{e:#}"),
                })),
            )
                .into_response()
        }
    }
}
