use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::core::cache::{Cache, Clock};
use crate::core::currency::CurrencyRateProvider;
use crate::core::price::PriceSeriesProvider;
use crate::core::series::{PricePoint, PriceSeries};
use crate::providers::util::{USER_AGENT, lookback_start, with_retry};

const RETRIES: usize = 2;
const RETRY_DELAY_MS: u64 = 250;

// YahooFinanceProvider implementation for PriceSeriesProvider
pub struct YahooFinanceProvider {
    base_url: String,
    cache: Arc<dyn Cache<String, PriceSeries>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl YahooFinanceProvider {
    pub fn new(
        base_url: &str,
        cache: Arc<dyn Cache<String, PriceSeries>>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
            clock,
            ttl,
        }
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartBody,
}

#[derive(Deserialize, Debug)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartItem>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

/// Chart endpoint for `symbol`; the symbol is one encoded path segment.
fn chart_url(base_url: &str, symbol: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| anyhow!("Invalid Yahoo Finance base URL {}: {}", base_url, e))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Yahoo Finance base URL cannot hold a path: {}", base_url))?
        .pop_if_empty()
        .extend(["v8", "finance", "chart", symbol]);
    Ok(url)
}

/// Pairs timestamps with closes, dropping null or non-positive closes.
fn extract_price_series(symbol: &str, data: YahooChartResponse) -> Result<PriceSeries> {
    if let Some(error) = data.chart.error {
        bail!(
            "Yahoo Finance API error ({}): {} {}",
            symbol,
            error.code,
            error.description
        );
    }

    let item = data
        .chart
        .result
        .and_then(|items| items.into_iter().next())
        .ok_or_else(|| anyhow!("No price data found for symbol: {}", symbol))?;

    let timestamps = item.timestamp.unwrap_or_default();
    let closes = item
        .indicators
        .and_then(|inds| inds.quote.into_iter().next())
        .and_then(|q| q.close)
        .unwrap_or_default();

    if timestamps.is_empty() || closes.is_empty() {
        bail!(
            "Missing price data for symbol: {} (timestamps: {}, prices: {})",
            symbol,
            timestamps.len(),
            closes.len()
        );
    }

    let points: Vec<PricePoint> = timestamps
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let price = close.filter(|p| p.is_finite() && *p > 0.0)?;
            let timestamp = Utc.timestamp_opt(*ts, 0).single()?;
            Some(PricePoint::new(timestamp, price))
        })
        .collect();

    if points.is_empty() {
        bail!("No valid prices for symbol: {}", symbol);
    }
    Ok(PriceSeries::new(points))
}

#[async_trait]
impl PriceSeriesProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooSeriesFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_price_series(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries> {
        let key = format!("{symbol}-{lookback_days}");
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let end = self.clock.now();
        let start = lookback_start(end, lookback_days)?;
        let mut url = chart_url(&self.base_url, symbol)?;
        url.query_pairs_mut()
            .append_pair("period1", &start.timestamp().to_string())
            .append_pair("period2", &end.timestamp().to_string())
            .append_pair("interval", "1d");
        debug!("Requesting price series from {}", url);

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = with_retry(|| client.get(url.clone()).send(), RETRIES, RETRY_DELAY_MS)
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))?;

        if !response.status().is_success() {
            bail!(
                "Yahoo Finance API error ({}): HTTP {}",
                symbol,
                response.status()
            );
        }

        let text = response.text().await?;
        let data: YahooChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        let series = extract_price_series(symbol, data)?;
        info!(points = series.len(), "Fetched price series");

        self.cache.put(key, series.clone(), Some(self.ttl)).await;
        Ok(series)
    }
}

// YahooCurrencyProvider implementation for CurrencyRateProvider
pub struct YahooCurrencyProvider {
    base_url: String,
    cache: Arc<dyn Cache<String, f64>>,
    ttl: Duration,
}

impl YahooCurrencyProvider {
    pub fn new(base_url: &str, cache: Arc<dyn Cache<String, f64>>, ttl: Duration) -> Self {
        YahooCurrencyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
            ttl,
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooCurrencyResponse {
    chart: CurrencyChartResult,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartResult {
    result: Vec<CurrencyChartItem>,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartItem {
    meta: CurrencyChartMeta,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
}

#[async_trait]
impl CurrencyRateProvider for YahooCurrencyProvider {
    #[instrument(name = "YahooRateFetch", skip(self))]
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let symbol = format!("{from}{to}=X");
        if let Some(cached) = self.cache.get(&symbol).await {
            return Ok(cached);
        }

        let url = chart_url(&self.base_url, &symbol)?;
        debug!("Requesting currency rate from {}", url);

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = with_retry(|| client.get(url.clone()).send(), RETRIES, RETRY_DELAY_MS)
            .await
            .map_err(|e| anyhow!("Request error: {} for currency pair: {}", e, symbol))?;

        if !response.status().is_success() {
            bail!(
                "HTTP error: {} for currency pair: {}",
                response.status(),
                symbol
            );
        }

        let text = response.text().await?;

        let data: YahooCurrencyResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        let item = data
            .chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No rate data found for currency pair: {}", symbol))?;

        let rate = item.meta.regular_market_price;
        self.cache.put(symbol, rate, Some(self.ttl)).await;
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::ManualClock;
    use crate::store::MemoryCache;
    use chrono::{DateTime, Duration as ChronoDuration};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HOUR: Duration = Duration::from_secs(3600);

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
    }

    fn provider(base_url: &str) -> YahooFinanceProvider {
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let cache: Arc<MemoryCache<String, PriceSeries>> =
            Arc::new(MemoryCache::with_clock(clock.clone()));
        YahooFinanceProvider::new(base_url, cache, clock, HOUR)
    }

    fn currency_provider(base_url: &str) -> YahooCurrencyProvider {
        let cache: Arc<MemoryCache<String, f64>> = Arc::new(MemoryCache::new());
        YahooCurrencyProvider::new(base_url, cache, HOUR)
    }

    pub async fn create_mock_server(symbol: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn chart_body(timestamps: &[i64], closes: &str) -> String {
        let timestamps: Vec<String> = timestamps.iter().map(|t| t.to_string()).collect();
        format!(
            r#"{{
                "chart": {{
                    "result": [{{
                        "meta": {{ "regularMarketPrice": 1.0, "currency": "USD" }},
                        "timestamp": [{}],
                        "indicators": {{ "quote": [{{ "close": [{}] }}] }}
                    }}],
                    "error": null
                }}
            }}"#,
            timestamps.join(", "),
            closes
        )
    }

    #[tokio::test]
    async fn test_successful_series_fetch() {
        let t0 = fixed_now().timestamp() - 3 * 86_400;
        let body = chart_body(&[t0, t0 + 86_400, t0 + 2 * 86_400], "100.0, null, 102.5");

        let mock_server = MockServer::start().await;
        let period2 = fixed_now().timestamp().to_string();
        let period1 = (fixed_now() - ChronoDuration::days(365))
            .timestamp()
            .to_string();
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BTC-USD"))
            .and(query_param("interval", "1d"))
            .and(query_param("period1", period1.as_str()))
            .and(query_param("period2", period2.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let provider = provider(&mock_server.uri());
        let series = provider.fetch_price_series("BTC-USD", 365).await.unwrap();

        // The null close is dropped
        assert_eq!(series.len(), 2);
        assert_eq!(series.first().unwrap().price, 100.0);
        assert_eq!(series.first().unwrap().timestamp.timestamp(), t0);
        assert_eq!(series.last().unwrap().price, 102.5);
    }

    #[test]
    fn test_chart_url_encodes_symbol() {
        let url = chart_url("https://query1.finance.yahoo.com", "BRK/B").unwrap();
        assert_eq!(
            url.as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/BRK%2FB"
        );

        let url = chart_url("http://127.0.0.1:8080/", "^GSPC").unwrap();
        assert_eq!(url.path_segments().unwrap().count(), 4);
        assert!(url.path().ends_with("GSPC"));

        assert!(chart_url("not a url", "BTC-USD").is_err());
    }

    #[tokio::test]
    async fn test_symbol_with_reserved_characters() {
        let t0 = fixed_now().timestamp() - 86_400;
        let body = chart_body(&[t0], "412.0");
        let mock_server = create_mock_server("BRK%2FB", &body).await;

        let series = provider(&mock_server.uri())
            .fetch_price_series("BRK/B", 30)
            .await
            .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.first().unwrap().price, 412.0);
    }

    #[tokio::test]
    async fn test_oversized_window_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server.uri())
            .fetch_price_series("BTC-USD", u32::MAX)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn test_series_is_cached_per_symbol_and_window() {
        let t0 = fixed_now().timestamp() - 86_400;
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/TSLA"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(chart_body(&[t0, t0 + 60], "1.0, 2.0")),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        let provider = provider(&mock_server.uri());
        provider.fetch_price_series("TSLA", 365).await.unwrap();
        provider.fetch_price_series("TSLA", 365).await.unwrap();
        // A different window is a different cache key
        provider.fetch_price_series("TSLA", 730).await.unwrap();
    }

    #[tokio::test]
    async fn test_chart_error_is_reported() {
        let mock_response = r#"{
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        }"#;
        let mock_server = create_mock_server("NOPE", mock_response).await;

        let result = provider(&mock_server.uri())
            .fetch_price_series("NOPE", 365)
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Yahoo Finance API error (NOPE): Not Found No data found, symbol may be delisted"
        );
    }

    #[tokio::test]
    async fn test_no_price_result_data() {
        let mock_response = r#"{"chart": {"result": []}}"#;
        let mock_server = create_mock_server("INVALID", mock_response).await;

        let result = provider(&mock_server.uri())
            .fetch_price_series("INVALID", 365)
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price data found for symbol: INVALID"
        );
    }

    #[tokio::test]
    async fn test_missing_and_null_only_data() {
        let mock_server = create_mock_server("EMPTY", &chart_body(&[], "")).await;
        let err = provider(&mock_server.uri())
            .fetch_price_series("EMPTY", 365)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing price data for symbol: EMPTY (timestamps: 0, prices: 0)"
        );

        let t0 = fixed_now().timestamp() - 86_400;
        let mock_server = create_mock_server("NULLS", &chart_body(&[t0, t0 + 60], "null, null")).await;
        let err = provider(&mock_server.uri())
            .fetch_price_series("NULLS", 365)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No valid prices for symbol: NULLS");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server.uri())
            .fetch_price_series("AAPL", 365)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Yahoo Finance API error (AAPL): HTTP 429 Too Many Requests"
        );
    }

    // Tests for YahooCurrencyProvider (CurrencyRateProvider)
    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_server = MockServer::start().await;
        let provider = currency_provider(&mock_server.uri());

        let mock_response = r#"{
            "chart": {
                "result": [
                    {
                        "meta": {
                            "regularMarketPrice": 1382.15
                        }
                    }
                ]
            }
        }"#;

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/USDKRW=X"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .expect(1)
            .mount(&mock_server)
            .await;

        let rate = provider
            .get_rate("USD", "KRW")
            .await
            .expect("Failed to get rate");
        assert_eq!(rate, 1382.15);

        // Served from cache the second time
        assert_eq!(provider.get_rate("USD", "KRW").await.unwrap(), 1382.15);
    }

    #[tokio::test]
    async fn test_no_currency_rate_found() {
        let mock_server = create_mock_server("USDJPY=X", r#"{"chart": {"result": []}}"#).await;

        let result = currency_provider(&mock_server.uri())
            .get_rate("USD", "JPY")
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No rate data found for currency pair: USDJPY=X"
        );
    }

    #[tokio::test]
    async fn test_yahoo_currency_api_error_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/USDCNY=X"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let result = currency_provider(&mock_server.uri())
            .get_rate("USD", "CNY")
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for currency pair: USDCNY=X"
        );
    }

    #[tokio::test]
    async fn test_yahoo_currency_api_malformed_response() {
        let mock_response = r#"{ "chart": { "results": [] } }"#;
        let mock_server = create_mock_server("USDKRW=X", mock_response).await;

        let result = currency_provider(&mock_server.uri())
            .get_rate("USD", "KRW")
            .await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for USDKRW=X")
        );
    }
}
