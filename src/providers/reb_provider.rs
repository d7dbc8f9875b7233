//! Korea Real Estate Board land price index.
//!
//! The upstream publishes one index value per month. Months are fetched one
//! request at a time, then densified to daily samples so the simulator sees
//! the same shape as market prices.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::core::cache::{Cache, Clock};
use crate::core::price::PriceSeriesProvider;
use crate::core::series::{PricePoint, PriceSeries, clip, extend_flat, interpolate_daily};
use crate::providers::util::{USER_AGENT, lookback_start};

const STAT_TABLE_ID: &str = "A_2024_00901";
const NATIONAL_LABEL: &str = "전국";
const SEOUL_PREFIX: &str = "서울>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// The nationwide index row.
    National,
    /// Mean of Seoul's district rows.
    Seoul,
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Region::National => "national",
                Region::Seoul => "seoul",
            }
        )
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "national" | "korea" => Ok(Region::National),
            "seoul" => Ok(Region::Seoul),
            _ => Err(anyhow!("Unknown real estate region: {}", s)),
        }
    }
}

impl Region {
    fn index_value(&self, rows: &[RebRow]) -> Option<f64> {
        match self {
            Region::National => rows
                .iter()
                .find(|row| row.cls_nm == NATIONAL_LABEL)
                .and_then(RebRow::value),
            Region::Seoul => {
                let values: Vec<f64> = rows
                    .iter()
                    .filter(|row| {
                        row.cls_fullnm.starts_with(SEOUL_PREFIX)
                            && row.cls_fullnm.split('>').count() == 2
                    })
                    .filter_map(RebRow::value)
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
        }
    }
}

#[derive(Deserialize, Debug)]
struct RebResponse {
    #[serde(rename = "RESULT")]
    result: Option<RebResult>,
    #[serde(rename = "SttsApiTblData", default)]
    table: Vec<RebSection>,
}

impl RebResponse {
    fn status(&self) -> Option<&RebResult> {
        self.result.as_ref().or_else(|| {
            self.table
                .iter()
                .flat_map(|section| &section.head)
                .find_map(|head| head.result.as_ref())
        })
    }
}

#[derive(Deserialize, Debug)]
struct RebSection {
    #[serde(default)]
    head: Vec<RebHead>,
    #[serde(default)]
    row: Vec<RebRow>,
}

#[derive(Deserialize, Debug)]
struct RebHead {
    #[serde(rename = "RESULT")]
    result: Option<RebResult>,
}

#[derive(Deserialize, Debug)]
struct RebResult {
    #[serde(rename = "CODE")]
    code: String,
    #[serde(rename = "MESSAGE", default)]
    message: String,
}

#[derive(Deserialize, Debug)]
struct RebRow {
    #[serde(rename = "CLS_NM", default)]
    cls_nm: String,
    #[serde(rename = "CLS_FULLNM", default)]
    cls_fullnm: String,
    #[serde(rename = "DTA_VAL")]
    dta_val: Option<serde_json::Value>,
}

impl RebRow {
    /// `DTA_VAL` arrives as either a number or a numeric string.
    fn value(&self) -> Option<f64> {
        let value = match self.dta_val.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}

/// First day of every month from `start`'s month through `end`'s month.
fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = start.with_day(1);
    while let Some(month) = current {
        if month > end {
            break;
        }
        months.push(month);
        current = month.checked_add_months(chrono::Months::new(1));
    }
    months
}

fn month_start(month: NaiveDate) -> Option<DateTime<Utc>> {
    month
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Last day of the month containing `date`, at midnight UTC.
fn month_end(date: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let next = date
        .date_naive()
        .with_day(1)?
        .checked_add_months(chrono::Months::new(1))?;
    month_start(next).map(|d| d - ChronoDuration::days(1))
}

pub struct RebIndexProvider {
    base_url: String,
    api_key: Option<String>,
    request_delay: Duration,
    cache: Arc<dyn Cache<String, PriceSeries>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl RebIndexProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        request_delay: Duration,
        cache: Arc<dyn Cache<String, PriceSeries>>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            request_delay,
            cache,
            clock,
            ttl,
        }
    }

    async fn fetch_month(
        &self,
        client: &reqwest::Client,
        api_key: &str,
        month: NaiveDate,
        region: Region,
    ) -> Result<Option<f64>> {
        let url = format!(
            "{}/r-one/openapi/SttsApiTblData.do?STATBL_ID={}&DTACYCLE_CD=MM&WRTTIME_IDTFR_ID={}&Type=json&KEY={}&pSize=1000",
            self.base_url,
            STAT_TABLE_ID,
            month.format("%Y%m"),
            api_key
        );

        let response = client
            .get(&url)
            .send()
            .await
            .context("Real estate API request failed")?;
        if !response.status().is_success() {
            bail!("Real estate API error: HTTP {}", response.status());
        }

        let data: RebResponse = response
            .json()
            .await
            .context("Failed to parse real estate API response")?;
        if let Some(status) = data.status() {
            if status.code.starts_with("ERROR") {
                bail!("Real estate API error: {} {}", status.code, status.message);
            }
        }

        let rows: Vec<RebRow> = data
            .table
            .into_iter()
            .flat_map(|section| section.row)
            .collect();
        Ok(region.index_value(&rows))
    }
}

#[async_trait]
impl PriceSeriesProvider for RebIndexProvider {
    #[instrument(name = "RebSeriesFetch", skip(self))]
    async fn fetch_price_series(&self, symbol: &str, lookback_days: u32) -> Result<PriceSeries> {
        let region: Region = symbol.parse()?;
        let key = format!("{region}-real-estate-{lookback_days}");
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("REAL_ESTATE_API_KEY is not set"))?;

        let end = self.clock.now();
        let start = lookback_start(end, lookback_days)?;
        let months = months_between(start.date_naive(), end.date_naive());
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        let mut monthly = Vec::with_capacity(months.len());
        for (i, month) in months.iter().enumerate() {
            match self.fetch_month(&client, api_key, *month, region).await {
                Ok(Some(value)) => {
                    if let Some(timestamp) = month_start(*month) {
                        monthly.push(PricePoint::new(timestamp, value));
                    }
                }
                Ok(None) => debug!(%month, "No index row for region"),
                Err(e) => warn!(%month, error = %e, "Skipping month"),
            }

            if i + 1 < months.len() && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        if monthly.is_empty() {
            bail!("No valid real estate index data found for {}", region);
        }

        let mut daily = interpolate_daily(&monthly);
        if let Some(last) = daily.last().map(|p| p.timestamp) {
            let fill_until = month_end(last).map_or(end, |month_end| month_end.min(end));
            extend_flat(&mut daily, fill_until);
        }
        let daily = clip(daily, start, end);
        if daily.is_empty() {
            bail!("No real estate index data inside the requested window for {}", region);
        }

        info!(
            months = monthly.len(),
            points = daily.len(),
            "Fetched real estate index"
        );
        let series = PriceSeries::new(daily);
        self.cache.put(key, series.clone(), Some(self.ttl)).await;
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::ManualClock;
    use crate::store::MemoryCache;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DATA_PATH: &str = "/r-one/openapi/SttsApiTblData.do";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
    }

    fn provider(base_url: &str, api_key: Option<&str>) -> RebIndexProvider {
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let cache: Arc<MemoryCache<String, PriceSeries>> =
            Arc::new(MemoryCache::with_clock(clock.clone()));
        RebIndexProvider::new(
            base_url,
            api_key.map(str::to_string),
            Duration::ZERO,
            cache,
            clock,
            Duration::from_secs(86_400),
        )
    }

    fn table_body(rows: &str) -> String {
        format!(
            r#"{{
                "SttsApiTblData": [
                    {{ "head": [ {{ "list_total_count": 3 }}, {{ "RESULT": {{ "CODE": "INFO-000", "MESSAGE": "OK" }} }} ] }},
                    {{ "row": [ {rows} ] }}
                ]
            }}"#
        )
    }

    fn national_row(value: f64) -> String {
        format!(
            r#"{{ "CLS_NM": "전국", "CLS_FULLNM": "전국", "DTA_VAL": "{value}" }},
               {{ "CLS_NM": "서울", "CLS_FULLNM": "서울", "DTA_VAL": 1.0 }}"#
        )
    }

    async fn mount_month(server: &MockServer, yyyymm: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(DATA_PATH))
            .and(query_param("WRTTIME_IDTFR_ID", yyyymm))
            .and(query_param("KEY", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_months_between() {
        let months = months_between(
            NaiveDate::from_ymd_opt(2023, 11, 20).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 3).unwrap(),
        );
        let labels: Vec<String> = months.iter().map(|m| m.format("%Y%m").to_string()).collect();
        assert_eq!(labels, vec!["202311", "202312", "202401", "202402"]);
    }

    #[test]
    fn test_region_parsing() {
        assert_eq!("national".parse::<Region>().unwrap(), Region::National);
        assert_eq!("Seoul".parse::<Region>().unwrap(), Region::Seoul);
        assert!("busan".parse::<Region>().is_err());
    }

    #[tokio::test]
    async fn test_national_index_is_densified_to_daily() {
        let server = MockServer::start().await;
        mount_month(&server, "202401", table_body(&national_row(100.0))).await;
        mount_month(&server, "202402", table_body(&national_row(103.1))).await;
        mount_month(&server, "202403", table_body(&national_row(106.0))).await;

        let series = provider(&server.uri(), Some("test-key"))
            .fetch_price_series("national", 60)
            .await
            .unwrap();

        // 2024-01-15 through 2024-03-15 inclusive
        assert_eq!(series.len(), 61);
        let first = series.first().unwrap();
        assert_eq!(first.timestamp, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert!((first.price - (100.0 + 3.1 * 14.0 / 31.0)).abs() < 1e-9);

        let feb_first = series
            .points()
            .iter()
            .find(|p| p.timestamp == Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
            .unwrap();
        assert_eq!(feb_first.price, 103.1);

        // March is the last month: carried flat up to "now"
        let last = series.last().unwrap();
        assert_eq!(last.timestamp, fixed_now());
        assert_eq!(last.price, 106.0);
    }

    #[tokio::test]
    async fn test_seoul_averages_district_rows_only() {
        let rows = r#"
            { "CLS_NM": "종로구", "CLS_FULLNM": "서울>종로구", "DTA_VAL": "100.0" },
            { "CLS_NM": "강남구", "CLS_FULLNM": "서울>강남구", "DTA_VAL": 110.0 },
            { "CLS_NM": "역삼동", "CLS_FULLNM": "서울>강남구>역삼동", "DTA_VAL": "999" },
            { "CLS_NM": "중구", "CLS_FULLNM": "부산>중구", "DTA_VAL": "50" },
            { "CLS_NM": "서울", "CLS_FULLNM": "서울", "DTA_VAL": "70" }
        "#;
        let server = MockServer::start().await;
        mount_month(&server, "202403", table_body(rows)).await;

        let series = provider(&server.uri(), Some("test-key"))
            .fetch_price_series("seoul", 10)
            .await
            .unwrap();

        assert!(!series.is_empty());
        assert!(series.points().iter().all(|p| p.price == 105.0));
    }

    #[tokio::test]
    async fn test_failed_months_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DATA_PATH))
            .and(query_param("WRTTIME_IDTFR_ID", "202401"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_month(
            &server,
            "202402",
            r#"{ "RESULT": { "CODE": "ERROR-300", "MESSAGE": "missing parameter" } }"#.to_string(),
        )
        .await;
        mount_month(&server, "202403", table_body(&national_row(106.0))).await;

        let series = provider(&server.uri(), Some("test-key"))
            .fetch_price_series("national", 60)
            .await
            .unwrap();

        // Only March survived: 2024-03-01 through 2024-03-15
        assert_eq!(series.len(), 15);
        assert!(series.points().iter().all(|p| p.price == 106.0));
    }

    #[tokio::test]
    async fn test_no_usable_month_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DATA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(table_body("")))
            .mount(&server)
            .await;

        let err = provider(&server.uri(), Some("test-key"))
            .fetch_price_series("national", 30)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No valid real estate index data found for national"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let server = MockServer::start().await;
        let err = provider(&server.uri(), None)
            .fetch_price_series("national", 30)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "REAL_ESTATE_API_KEY is not set");
    }

    #[tokio::test]
    async fn test_oversized_window_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server.uri(), Some("test-key"))
            .fetch_price_series("national", u32::MAX)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Lookback of 4294967295 days is out of range"
        );
    }
}
