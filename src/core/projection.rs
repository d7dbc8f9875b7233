//! Request validation and asset dispatch around the simulator.

use crate::core::assets::{AssetDefinition, AssetRegistry, AssetType};
use crate::core::cache::Clock;
use crate::core::error::SimulationError;
use crate::core::price::PriceSeriesProvider;
use crate::core::series::{PriceSeries, synthetic_cash_series};
use crate::core::simulator::{
    Cadence, ContributionPlan, Resolution, SimulationResult, simulate_with,
};
use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

pub const YEARS_AGO_RANGE: RangeInclusive<u32> = 1..=10;
const DAYS_PER_YEAR: u32 = 365;
/// Longest price window any caller may ask for.
pub const MAX_LOOKBACK_DAYS: u32 = *YEARS_AGO_RANGE.end() * DAYS_PER_YEAR;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid asset. Please select a supported asset.")]
    UnknownAsset,
    #[error("Invalid yearsAgo. Must be between 1 and 10.")]
    YearsOutOfRange,
    #[error("Invalid amount. Must be greater than 0.")]
    InvalidAmount,
    #[error("Invalid type. Must be \"single\" or \"recurring\".")]
    InvalidType,
    #[error("Invalid frequency. Must be \"monthly\" or \"weekly\".")]
    InvalidFrequency,
    #[error("Invalid days. Must be between 1 and 3650.")]
    LookbackOutOfRange,
}

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error(transparent)]
    Invalid(#[from] RequestError),
    #[error("{0:#}")]
    Provider(anyhow::Error),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// Calculation request as sent by a caller. Everything is optional so that
/// validation can report which field is wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRequest {
    #[serde(default)]
    pub asset: String,
    pub years_ago: Option<u32>,
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub investment_type: Option<String>,
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub asset: AssetDefinition,
    pub years_ago: u32,
    pub plan: ContributionPlan,
}

impl ValidatedRequest {
    pub fn lookback_days(&self) -> u32 {
        self.years_ago * DAYS_PER_YEAR
    }
}

impl ProjectionRequest {
    pub fn validate(&self, registry: &AssetRegistry) -> Result<ValidatedRequest, RequestError> {
        let asset = registry
            .find(&self.asset)
            .ok_or(RequestError::UnknownAsset)?;

        let years_ago = self
            .years_ago
            .filter(|y| YEARS_AGO_RANGE.contains(y))
            .ok_or(RequestError::YearsOutOfRange)?;

        let amount = self
            .amount
            .filter(|a| a.is_finite() && *a > 0.0)
            .ok_or(RequestError::InvalidAmount)?;

        let frequency = self
            .frequency
            .as_deref()
            .map(|f| f.parse::<Cadence>().map_err(|_| RequestError::InvalidFrequency))
            .transpose()?;

        let plan = match self.investment_type.as_deref() {
            Some("single") => ContributionPlan::single(amount),
            Some("recurring") => {
                ContributionPlan::recurring(amount, frequency.ok_or(RequestError::InvalidFrequency)?)
            }
            _ => return Err(RequestError::InvalidType),
        };

        Ok(ValidatedRequest {
            asset: asset.clone(),
            years_ago,
            plan,
        })
    }
}

/// Resolves price series per asset type and runs the simulator.
pub struct ProjectionService {
    registry: AssetRegistry,
    market: Arc<dyn PriceSeriesProvider>,
    real_estate: Arc<dyn PriceSeriesProvider>,
    clock: Arc<dyn Clock>,
    resolution: Resolution,
}

impl ProjectionService {
    pub fn new(
        registry: AssetRegistry,
        market: Arc<dyn PriceSeriesProvider>,
        real_estate: Arc<dyn PriceSeriesProvider>,
        clock: Arc<dyn Clock>,
        resolution: Resolution,
    ) -> Self {
        Self {
            registry,
            market,
            real_estate,
            clock,
            resolution,
        }
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Daily prices for `asset` over the last `days` days.
    ///
    /// Cash never reaches a provider; its series is synthesized.
    pub async fn price_series(
        &self,
        asset: &AssetDefinition,
        days: u32,
    ) -> anyhow::Result<PriceSeries> {
        if days == 0 || days > MAX_LOOKBACK_DAYS {
            bail!(RequestError::LookbackOutOfRange);
        }
        let provider = match asset.asset_type {
            AssetType::Cash => {
                debug!(asset = %asset.id, rate = asset.cash_rate(), "Synthesizing cash series");
                return Ok(synthetic_cash_series(
                    asset.cash_rate(),
                    days,
                    self.clock.now(),
                ));
            }
            AssetType::Crypto | AssetType::Stock => &self.market,
            AssetType::RealEstate => &self.real_estate,
        };

        let symbol = asset
            .symbol
            .as_deref()
            .ok_or_else(|| anyhow!("Asset {} is missing a data symbol", asset.id))?;
        provider.fetch_price_series(symbol, days).await
    }

    pub async fn project(
        &self,
        request: &ProjectionRequest,
    ) -> Result<SimulationResult, ProjectionError> {
        self.project_with(request, self.resolution).await
    }

    #[instrument(name = "Projection", skip(self, request), fields(asset = %request.asset))]
    pub async fn project_with(
        &self,
        request: &ProjectionRequest,
        resolution: Resolution,
    ) -> Result<SimulationResult, ProjectionError> {
        let validated = request.validate(&self.registry)?;
        let series = self
            .price_series(&validated.asset, validated.lookback_days())
            .await
            .map_err(ProjectionError::Provider)?;
        debug!(points = series.len(), "Price series ready");

        Ok(simulate_with(&validated.plan, &series, resolution)?)
    }
}
