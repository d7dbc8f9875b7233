//! Price series types and pure series generators

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Base price of a synthesized cash series.
pub const CASH_BASE_PRICE: f64 = 100.0;

/// Annual interest rate used for cash assets that don't configure one.
pub const DEFAULT_CASH_ANNUAL_RATE: f64 = 0.021;

/// One observed price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Ordered price samples for one asset and lookback window.
///
/// Providers promise ascending timestamps, but nothing here enforces it; the
/// simulator sorts its own copy before use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn into_points(self) -> Vec<PricePoint> {
        self.points
    }

    /// Returns a copy sorted ascending by timestamp.
    pub fn sorted(&self) -> Vec<PricePoint> {
        let mut points = self.points.clone();
        points.sort_by_key(|p| p.timestamp);
        points
    }
}

impl From<Vec<PricePoint>> for PriceSeries {
    fn from(points: Vec<PricePoint>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<PricePoint> for PriceSeries {
    fn from_iter<I: IntoIterator<Item = PricePoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Synthesizes a daily series for an interest-bearing cash asset.
///
/// Sample `i` sits `days - i` days before `end` and is priced at
/// `CASH_BASE_PRICE * (1 + annual_rate / 365)^i`. Samples that would fall
/// outside the representable date range are skipped.
pub fn synthetic_cash_series(annual_rate: f64, days: u32, end: DateTime<Utc>) -> PriceSeries {
    let daily_rate = annual_rate / 365.0;
    (0..days)
        .filter_map(|i| {
            let timestamp = Duration::try_days(i64::from(days - i))
                .and_then(|offset| end.checked_sub_signed(offset))?;
            let price = CASH_BASE_PRICE * (1.0 + daily_rate).powf(f64::from(i));
            Some(PricePoint::new(timestamp, price))
        })
        .collect()
}

/// Fills the gap between consecutive samples with one linearly interpolated
/// point per whole day.
///
/// Input order doesn't matter. Input samples are kept as-is; a gap of `n`
/// whole days gets `n - 1` synthetic points.
pub fn interpolate_daily(points: &[PricePoint]) -> Vec<PricePoint> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.timestamp);

    let mut dense = Vec::with_capacity(sorted.len());
    for (i, current) in sorted.iter().enumerate() {
        dense.push(*current);

        let Some(next) = sorted.get(i + 1) else {
            break;
        };
        let days_between = (next.timestamp - current.timestamp).num_days();
        for day in 1..days_between {
            let ratio = day as f64 / days_between as f64;
            dense.push(PricePoint::new(
                current.timestamp + Duration::days(day),
                current.price + (next.price - current.price) * ratio,
            ));
        }
    }
    dense
}

/// Repeats the last price once per day up to and including `until`.
pub fn extend_flat(points: &mut Vec<PricePoint>, until: DateTime<Utc>) {
    let Some(last) = points.last().copied() else {
        return;
    };
    let mut next = last.timestamp + Duration::days(1);
    while next <= until {
        points.push(PricePoint::new(next, last.price));
        next += Duration::days(1);
    }
}

/// Keeps only points with `start <= timestamp <= end`.
pub fn clip(points: Vec<PricePoint>, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<PricePoint> {
    points
        .into_iter()
        .filter(|p| p.timestamp >= start && p.timestamp <= end)
        .collect()
}
