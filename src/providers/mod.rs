pub mod reb_provider;
pub mod util;
pub mod yahoo_finance;

pub use reb_provider::RebIndexProvider;
pub use yahoo_finance::{YahooCurrencyProvider, YahooFinanceProvider};
