//! Error types for the investment simulator

use crate::core::simulator::Cadence;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimulationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("No price data available")]
    EmptySeries,

    #[error("No {cadence} contribution fits in a window of {total_years:.3} years")]
    DegenerateSchedule { cadence: Cadence, total_years: f64 },

    #[error("Cannot derive returns: total invested {total_invested}, elapsed years {total_years}")]
    DivisionDegeneracy {
        total_invested: f64,
        total_years: f64,
    },
}
