//! Registry of assets that can be projected

use crate::core::series::DEFAULT_CASH_ANNUAL_RATE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Crypto,
    Stock,
    Cash,
    RealEstate,
}

impl Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetType::Crypto => "crypto",
                AssetType::Stock => "stock",
                AssetType::Cash => "cash",
                AssetType::RealEstate => "real_estate",
            }
        )
    }
}

/// One selectable asset.
///
/// `symbol` is the upstream identifier: a Yahoo ticker for market assets, a
/// region code for real-estate indices, unused for cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_years_ago: Option<u32>,
    #[serde(default)]
    pub order: i32,
    /// Annual interest rate for cash assets, as a fraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_rate: Option<f64>,
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

impl AssetDefinition {
    /// Name in `lang`, falling back to English and then to the id.
    pub fn display_name(&self, lang: &str) -> &str {
        self.names
            .get(lang)
            .or_else(|| self.names.get("en"))
            .map_or(self.id.as_str(), String::as_str)
    }

    pub fn cash_rate(&self) -> f64 {
        self.annual_rate.unwrap_or(DEFAULT_CASH_ANNUAL_RATE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRegistry {
    assets: Vec<AssetDefinition>,
}

impl AssetRegistry {
    pub fn new(assets: Vec<AssetDefinition>) -> Self {
        Self { assets }
    }

    pub fn find(&self, id: &str) -> Option<&AssetDefinition> {
        self.assets.iter().find(|asset| asset.id == id)
    }

    /// All assets ordered by their `order` field.
    pub fn sorted(&self) -> Vec<AssetDefinition> {
        let mut assets = self.assets.clone();
        assets.sort_by_key(|asset| asset.order);
        assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new(default_assets())
    }
}

fn asset(
    id: &str,
    asset_type: AssetType,
    symbol: Option<&str>,
    icon: &str,
    order: i32,
    names: &[(&str, &str)],
) -> AssetDefinition {
    AssetDefinition {
        id: id.to_string(),
        asset_type,
        symbol: symbol.map(str::to_string),
        icon: Some(icon.to_string()),
        default_years_ago: None,
        order,
        annual_rate: None,
        names: names
            .iter()
            .map(|(lang, name)| (lang.to_string(), name.to_string()))
            .collect(),
    }
}

/// Built-in registry used when the config doesn't list any assets.
pub fn default_assets() -> Vec<AssetDefinition> {
    let mut bitcoin = asset(
        "bitcoin",
        AssetType::Crypto,
        Some("BTC-USD"),
        "🪙",
        1,
        &[("en", "Bitcoin"), ("ko", "비트코인"), ("zh", "比特币"), ("ja", "ビットコイン")],
    );
    bitcoin.default_years_ago = Some(5);

    let mut ethereum = asset(
        "ethereum",
        AssetType::Crypto,
        Some("ETH-USD"),
        "💎",
        2,
        &[("en", "Ethereum"), ("ko", "이더리움"), ("zh", "以太坊"), ("ja", "イーサリアム")],
    );
    ethereum.default_years_ago = Some(5);

    let mut cash = asset(
        "cash",
        AssetType::Cash,
        None,
        "💵",
        5,
        &[("en", "Savings Account"), ("ko", "예금"), ("zh", "存款"), ("ja", "預金")],
    );
    cash.annual_rate = Some(DEFAULT_CASH_ANNUAL_RATE);

    vec![
        bitcoin,
        ethereum,
        asset(
            "tesla",
            AssetType::Stock,
            Some("TSLA"),
            "⚡",
            3,
            &[("en", "Tesla"), ("ko", "테슬라"), ("zh", "特斯拉"), ("ja", "テスラ")],
        ),
        asset(
            "google",
            AssetType::Stock,
            Some("GOOGL"),
            "🔎",
            4,
            &[("en", "Google"), ("ko", "구글"), ("zh", "谷歌"), ("ja", "グーグル")],
        ),
        cash,
        asset(
            "korea-land",
            AssetType::RealEstate,
            Some("national"),
            "🏞️",
            6,
            &[("en", "Korea Land Price Index"), ("ko", "전국 지가지수")],
        ),
        asset(
            "seoul-land",
            AssetType::RealEstate,
            Some("seoul"),
            "🏙️",
            7,
            &[("en", "Seoul Land Price Index"), ("ko", "서울 지가지수")],
        ),
    ]
}
