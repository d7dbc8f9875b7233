use crate::core::assets::{AssetDefinition, AssetRegistry, default_assets};
use crate::core::simulator::Resolution;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_REB_BASE_URL: &str = "https://www.reb.or.kr";
pub const REAL_ESTATE_API_KEY_ENV: &str = "REAL_ESTATE_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RebProviderConfig {
    pub base_url: String,
    /// Falls back to the `REAL_ESTATE_API_KEY` environment variable.
    pub api_key: Option<String>,
    /// Pause between monthly requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

fn default_request_delay_ms() -> u64 {
    200
}

impl Default for RebProviderConfig {
    fn default() -> Self {
        RebProviderConfig {
            base_url: DEFAULT_REB_BASE_URL.to_string(),
            api_key: None,
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

impl RebProviderConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(REAL_ESTATE_API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub yahoo: YahooProviderConfig,
    #[serde(default)]
    pub reb: RebProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CacheConfig {
    pub price_ttl_secs: u64,
    pub real_estate_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            price_ttl_secs: 60 * 60,
            real_estate_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }

    pub fn real_estate_ttl(&self) -> Duration {
        Duration::from_secs(self.real_estate_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ChartConfig {
    #[serde(default)]
    pub resolution: Resolution,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Replaces the built-in asset list when non-empty.
    #[serde(default)]
    pub assets: Vec<AssetDefinition>,
    /// Static client settings served as-is by `GET /api/settings`.
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl AppConfig {
    /// Loads the config from the default location, or built-in defaults when
    /// no file exists there.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "longterm", "longterm")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn asset_registry(&self) -> AssetRegistry {
        if self.assets.is_empty() {
            AssetRegistry::new(default_assets())
        } else {
            AssetRegistry::new(self.assets.clone())
        }
    }
}
