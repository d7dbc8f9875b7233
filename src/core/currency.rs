//! Currency conversion abstractions

use crate::core::cache::{Cache, Clock};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Currencies quoted against USD by default.
pub const DEFAULT_QUOTES: [&str; 3] = ["KRW", "JPY", "CNY"];

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    /// Units of `to` per one unit of `from`.
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRates {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
    pub cached_date: NaiveDate,
}

/// Fetches a fixed set of rates in parallel and keeps them for the calendar day.
pub struct ExchangeRateService {
    provider: Arc<dyn CurrencyRateProvider>,
    cache: Arc<dyn Cache<NaiveDate, ExchangeRates>>,
    clock: Arc<dyn Clock>,
    base: String,
    quotes: Vec<String>,
}

impl ExchangeRateService {
    pub fn new(
        provider: Arc<dyn CurrencyRateProvider>,
        cache: Arc<dyn Cache<NaiveDate, ExchangeRates>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            cache,
            clock,
            base: "USD".to_string(),
            quotes: DEFAULT_QUOTES.iter().map(|q| q.to_string()).collect(),
        }
    }

    pub async fn usd_rates(&self) -> Result<ExchangeRates> {
        let today = self.clock.now().date_naive();
        if let Some(cached) = self.cache.get(&today).await {
            return Ok(cached);
        }

        info!(base = %self.base, quotes = ?self.quotes, "Fetching exchange rates");
        let futures = self.quotes.iter().map(|quote| async move {
            let rate = self.provider.get_rate(&self.base, quote).await;
            (quote.clone(), rate)
        });

        let mut rates = BTreeMap::new();
        for (quote, rate) in join_all(futures).await {
            let rate =
                rate.with_context(|| format!("Failed to fetch {}/{} rate", self.base, quote))?;
            if !rate.is_finite() || rate <= 0.0 {
                bail!("Invalid {}/{} rate: {}", self.base, quote, rate);
            }
            debug!(%quote, rate, "Fetched rate");
            rates.insert(quote, rate);
        }

        let result = ExchangeRates {
            base: self.base.clone(),
            rates,
            cached_date: today,
        };
        self.cache.put(today, result.clone(), Some(DAY)).await;
        Ok(result)
    }
}
