//! Core business logic abstractions

pub mod assets;
pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod price;
pub mod projection;
pub mod series;
pub mod simulator;

// Re-export main types for cleaner imports
pub use assets::{AssetDefinition, AssetRegistry, AssetType};
pub use cache::{Cache, Clock, SystemClock};
pub use currency::{CurrencyRateProvider, ExchangeRateService, ExchangeRates};
pub use error::SimulationError;
pub use price::PriceSeriesProvider;
pub use projection::{ProjectionError, ProjectionRequest, ProjectionService, RequestError};
pub use series::{PricePoint, PriceSeries};
pub use simulator::{
    Cadence, ContributionMode, ContributionPlan, DataPoint, Resolution, SimulationResult, simulate,
    simulate_with,
};
