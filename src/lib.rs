pub mod cli;
pub mod core;
pub mod providers;
pub mod server;
pub mod store;

pub use crate::core::config;

use crate::core::cache::{Cache, Clock, SystemClock};
use crate::core::currency::{ExchangeRateService, ExchangeRates};
use crate::core::projection::{ProjectionRequest, ProjectionService};
use crate::core::series::PriceSeries;
use crate::core::simulator::Resolution;
use crate::providers::{RebIndexProvider, YahooCurrencyProvider, YahooFinanceProvider};
use crate::store::MemoryCache;
use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Assets {
        lang: String,
        json: bool,
    },
    Prices {
        asset: String,
        days: u32,
        json: bool,
    },
    Calculate {
        request: ProjectionRequest,
        resolution: Option<Resolution>,
        json: bool,
    },
    Rates {
        json: bool,
    },
    Serve {
        bind_addr: Option<String>,
    },
}

/// Services wired from one configuration.
pub struct App {
    pub config: config::AppConfig,
    pub projections: Arc<ProjectionService>,
    pub exchange_rates: Arc<ExchangeRateService>,
}

impl App {
    pub fn new(config: config::AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: config::AppConfig, clock: Arc<dyn Clock>) -> Self {
        let series_cache: Arc<dyn Cache<String, PriceSeries>> =
            Arc::new(MemoryCache::with_clock(Arc::clone(&clock)));
        let rate_cache: Arc<dyn Cache<String, f64>> =
            Arc::new(MemoryCache::with_clock(Arc::clone(&clock)));
        let daily_rates: Arc<dyn Cache<NaiveDate, ExchangeRates>> =
            Arc::new(MemoryCache::with_clock(Arc::clone(&clock)));

        let yahoo_base_url = &config.providers.yahoo.base_url;
        let market = YahooFinanceProvider::new(
            yahoo_base_url,
            Arc::clone(&series_cache),
            Arc::clone(&clock),
            config.cache.price_ttl(),
        );

        let reb = &config.providers.reb;
        let real_estate = RebIndexProvider::new(
            &reb.base_url,
            reb.resolve_api_key(),
            Duration::from_millis(reb.request_delay_ms),
            series_cache,
            Arc::clone(&clock),
            config.cache.real_estate_ttl(),
        );

        let currency = YahooCurrencyProvider::new(yahoo_base_url, rate_cache, config.cache.price_ttl());

        let projections = ProjectionService::new(
            config.asset_registry(),
            Arc::new(market),
            Arc::new(real_estate),
            Arc::clone(&clock),
            config.chart.resolution,
        );
        let exchange_rates = ExchangeRateService::new(Arc::new(currency), daily_rates, clock);

        Self {
            config,
            projections: Arc::new(projections),
            exchange_rates: Arc::new(exchange_rates),
        }
    }

    pub fn server_state(&self) -> server::AppState {
        server::AppState {
            projections: Arc::clone(&self.projections),
            exchange_rates: Arc::clone(&self.exchange_rates),
            settings: Arc::new(self.config.settings.clone()),
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("longterm starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!(
        resolution = %config.chart.resolution,
        custom_assets = config.assets.len(),
        "Loaded config"
    );

    let app = App::new(config);

    match command {
        AppCommand::Assets { lang, json } => {
            cli::assets::run(app.projections.registry(), &lang, json)
        }
        AppCommand::Prices { asset, days, json } => {
            cli::prices::run(&app.projections, &asset, days, json).await
        }
        AppCommand::Calculate {
            request,
            resolution,
            json,
        } => cli::calculate::run(&app.projections, &request, resolution, json).await,
        AppCommand::Rates { json } => cli::rates::run(&app.exchange_rates, json).await,
        AppCommand::Serve { bind_addr } => {
            let bind_addr = bind_addr.unwrap_or_else(|| app.config.server.bind_addr.clone());
            server::serve(app.server_state(), &bind_addr).await
        }
    }
}
