//! Pricing abstractions

use crate::core::series::PriceSeries;
use anyhow::Result;
use async_trait::async_trait;

/// Source of historical daily prices.
///
/// `symbol` is whatever the implementation understands (a ticker, a region
/// code). Implementations own their retry and caching policy.
#[async_trait]
pub trait PriceSeriesProvider: Send + Sync {
    async fn fetch_price_series(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries>;
}
