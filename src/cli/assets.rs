use super::ui;
use crate::core::assets::{AssetRegistry, AssetType};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

pub fn render(registry: &AssetRegistry, lang: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Name"),
        ui::header_cell("Type"),
        ui::header_cell("Source"),
        ui::header_cell("Years"),
    ]);

    for asset in registry.sorted() {
        let source = match asset.asset_type {
            AssetType::Cash => format!("{:.2}% p.a.", asset.cash_rate() * 100.0),
            _ => asset.symbol.clone().unwrap_or_else(|| "N/A".to_string()),
        };
        let name = match &asset.icon {
            Some(icon) => format!("{icon} {}", asset.display_name(lang)),
            None => asset.display_name(lang).to_string(),
        };
        let default_years = asset
            .default_years_ago
            .map_or_else(|| "-".to_string(), |y| y.to_string());

        table.add_row(vec![
            Cell::new(&asset.id),
            Cell::new(name),
            Cell::new(asset.asset_type.to_string()),
            Cell::new(source),
            Cell::new(default_years).set_alignment(CellAlignment::Right),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Supported assets", ui::StyleType::Title),
        table
    )
}

pub fn run(registry: &AssetRegistry, lang: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&registry.sorted())?);
    } else {
        println!("{}", render(registry, lang));
    }
    Ok(())
}
