//! Investment growth simulation over a historical price series.
//!
//! Converts a [`PriceSeries`] and a [`ContributionPlan`] into cumulative
//! invested / portfolio value curves plus the summary metrics (CAGR and
//! simple yield). Everything here is pure and synchronous.

use crate::core::error::{Result, SimulationError};
use crate::core::series::{PricePoint, PriceSeries};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

const MILLIS_PER_DAY: f64 = 86_400_000.0;
const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Monthly,
    Weekly,
}

impl Cadence {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            Cadence::Monthly => 12,
            Cadence::Weekly => 52,
        }
    }
}

impl Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Cadence::Monthly => "monthly",
                Cadence::Weekly => "weekly",
            }
        )
    }
}

impl FromStr for Cadence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Cadence::Monthly),
            "weekly" => Ok(Cadence::Weekly),
            _ => Err(anyhow::anyhow!("Invalid frequency: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContributionMode {
    /// Whole amount invested at the first sample.
    Single,
    /// Amount split evenly across every period of the cadence.
    Recurring(Cadence),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionPlan {
    pub amount: f64,
    pub mode: ContributionMode,
}

impl ContributionPlan {
    pub fn single(amount: f64) -> Self {
        Self {
            amount,
            mode: ContributionMode::Single,
        }
    }

    pub fn recurring(amount: f64, cadence: Cadence) -> Self {
        Self {
            amount,
            mode: ContributionMode::Recurring(cadence),
        }
    }
}

/// How many points a recurring simulation emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// One point per contribution plus a closing point at the end of the window.
    #[default]
    PerContribution,
    /// One point per price sample, holding the state of the latest contribution.
    PerSample,
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Resolution::PerContribution => "per_contribution",
                Resolution::PerSample => "per_sample",
            }
        )
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "per_contribution" => Ok(Resolution::PerContribution),
            "per_sample" => Ok(Resolution::PerSample),
            _ => Err(anyhow::anyhow!("Invalid chart resolution: {}", s)),
        }
    }
}

/// A chart point: `x` in elapsed years, `y` in the plan's currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

impl DataPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub total_invested: f64,
    pub final_value: f64,
    /// Compound annual growth rate, in percent.
    pub cagr: f64,
    /// Simple return over the whole window, in percent.
    pub yield_rate: f64,
    #[serde(rename = "investedSpots")]
    pub invested_curve: Vec<DataPoint>,
    #[serde(rename = "valueSpots")]
    pub value_curve: Vec<DataPoint>,
    /// Number of purchases executed.
    #[serde(skip)]
    pub contributions: usize,
}

/// Simulates `plan` over `series` with the default chart resolution.
pub fn simulate(plan: &ContributionPlan, series: &PriceSeries) -> Result<SimulationResult> {
    simulate_with(plan, series, Resolution::default())
}

pub fn simulate_with(
    plan: &ContributionPlan,
    series: &PriceSeries,
    resolution: Resolution,
) -> Result<SimulationResult> {
    let prices = series.sorted();
    let (Some(first), Some(last)) = (prices.first(), prices.last()) else {
        return Err(SimulationError::EmptySeries);
    };

    let window = Window {
        start_price: first.price,
        end_price: last.price,
        total_years: elapsed_years(first.timestamp, last.timestamp),
        samples: prices.len(),
    };

    let growth = match plan.mode {
        ContributionMode::Single => lump_sum(plan.amount, &prices, &window),
        ContributionMode::Recurring(cadence) => {
            dollar_cost_average(plan.amount, cadence, &prices, &window, resolution)?
        }
    };

    let (cagr, yield_rate) =
        derive_metrics(growth.total_invested, growth.final_value, window.total_years)?;

    debug!(
        samples = window.samples,
        total_years = window.total_years,
        contributions = growth.contributions,
        total_invested = growth.total_invested,
        final_value = growth.final_value,
        cagr,
        yield_rate,
        "Simulation complete"
    );

    Ok(SimulationResult {
        total_invested: growth.total_invested,
        final_value: growth.final_value,
        cagr,
        yield_rate,
        invested_curve: growth.invested_curve,
        value_curve: growth.value_curve,
        contributions: growth.contributions,
    })
}

/// Returns `(cagr, yield_rate)`, both in percent.
pub fn derive_metrics(total_invested: f64, final_value: f64, total_years: f64) -> Result<(f64, f64)> {
    let degenerate = SimulationError::DivisionDegeneracy {
        total_invested,
        total_years,
    };
    if total_invested <= 0.0 || total_years <= 0.0 {
        return Err(degenerate);
    }

    let yield_rate = (final_value - total_invested) / total_invested * 100.0;
    let cagr = ((final_value / total_invested).powf(1.0 / total_years) - 1.0) * 100.0;
    if !cagr.is_finite() || !yield_rate.is_finite() {
        return Err(degenerate);
    }
    Ok((cagr, yield_rate))
}

/// Wall-clock span between two instants, in 365-day years.
pub fn elapsed_years(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / MILLIS_PER_DAY / DAYS_PER_YEAR
}

struct Window {
    start_price: f64,
    end_price: f64,
    total_years: f64,
    samples: usize,
}

impl Window {
    /// Elapsed years assigned to the sample at `index`.
    fn x_at(&self, index: usize) -> f64 {
        index as f64 / self.samples as f64 * self.total_years
    }
}

struct Growth {
    total_invested: f64,
    final_value: f64,
    invested_curve: Vec<DataPoint>,
    value_curve: Vec<DataPoint>,
    contributions: usize,
}

struct Contribution {
    day_index: usize,
    shares: f64,
    invested: f64,
}

fn lump_sum(amount: f64, prices: &[PricePoint], window: &Window) -> Growth {
    let (invested_curve, value_curve) = prices
        .iter()
        .enumerate()
        .map(|(index, point)| {
            let x = window.x_at(index);
            (
                DataPoint::new(x, amount),
                DataPoint::new(x, amount * point.price / window.start_price),
            )
        })
        .unzip();

    Growth {
        total_invested: amount,
        final_value: amount * window.end_price / window.start_price,
        invested_curve,
        value_curve,
        contributions: 1,
    }
}

fn dollar_cost_average(
    amount: f64,
    cadence: Cadence,
    prices: &[PricePoint],
    window: &Window,
    resolution: Resolution,
) -> Result<Growth> {
    let total_periods = (window.total_years * f64::from(cadence.periods_per_year())).floor() as usize;
    if total_periods == 0 {
        return Err(SimulationError::DegenerateSchedule {
            cadence,
            total_years: window.total_years,
        });
    }
    let per_period = amount / total_periods as f64;

    let mut contributions = Vec::with_capacity(total_periods);
    let mut shares = 0.0;
    let mut invested = 0.0;
    for period in 0..total_periods {
        let day_index = period * window.samples / total_periods;
        let Some(point) = prices.get(day_index) else {
            break;
        };
        shares += per_period / point.price;
        invested += per_period;
        contributions.push(Contribution {
            day_index,
            shares,
            invested,
        });
    }

    let mut invested_curve = Vec::new();
    let mut value_curve = Vec::new();
    match resolution {
        Resolution::PerContribution => {
            for c in &contributions {
                let x = window.x_at(c.day_index);
                invested_curve.push(DataPoint::new(x, c.invested));
                value_curve.push(DataPoint::new(x, c.shares * prices[c.day_index].price));
            }
            invested_curve.push(DataPoint::new(window.total_years, invested));
            value_curve.push(DataPoint::new(window.total_years, shares * window.end_price));
        }
        Resolution::PerSample => {
            let mut current = 0;
            for (index, point) in prices.iter().enumerate() {
                while current + 1 < contributions.len() && contributions[current + 1].day_index <= index {
                    current += 1;
                }
                let (held, paid) = contributions
                    .get(current)
                    .map_or((0.0, 0.0), |c| (c.shares, c.invested));
                let x = window.x_at(index);
                invested_curve.push(DataPoint::new(x, paid));
                value_curve.push(DataPoint::new(x, held * point.price));
            }
        }
    }

    Ok(Growth {
        total_invested: invested,
        final_value: shares * window.end_price,
        invested_curve,
        value_curve,
        contributions: contributions.len(),
    })
}
