use super::ui;
use crate::core::assets::AssetDefinition;
use crate::core::projection::ProjectionService;
use crate::core::series::PriceSeries;
use anyhow::{Result, anyhow};
use comfy_table::Cell;
use tracing::info;

/// Number of evenly spaced samples shown in the table.
const PREVIEW_ROWS: usize = 10;

pub fn render(asset: &AssetDefinition, series: &PriceSeries) -> String {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return format!("No price data for {}", asset.id);
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Date"), ui::header_cell("Price")]);
    for point in preview(series.points(), PREVIEW_ROWS) {
        table.add_row(vec![
            Cell::new(point.timestamp.format("%Y-%m-%d")),
            ui::amount_cell(point.price),
        ]);
    }

    let mut summary = ui::new_styled_table();
    summary.add_row(vec![
        Cell::new(ui::style_text("Samples", ui::StyleType::TotalLabel)),
        Cell::new(series.len()),
    ]);
    summary.add_row(vec![
        Cell::new(ui::style_text("Change", ui::StyleType::TotalLabel)),
        ui::change_cell((last.price / first.price - 1.0) * 100.0),
    ]);

    format!(
        "Prices: {} ({} to {})\n\n{}\n\n{}",
        ui::style_text(&asset.id, ui::StyleType::Title),
        first.timestamp.format("%Y-%m-%d"),
        last.timestamp.format("%Y-%m-%d"),
        table,
        summary
    )
}

/// Picks `rows` evenly spaced items, always including the first and last.
pub(crate) fn preview<T>(items: &[T], rows: usize) -> Vec<&T> {
    if items.len() <= rows || rows < 2 {
        return items.iter().collect();
    }
    (0..rows)
        .map(|i| &items[i * (items.len() - 1) / (rows - 1)])
        .collect()
}

pub async fn run(service: &ProjectionService, asset_id: &str, days: u32, json: bool) -> Result<()> {
    let asset = service
        .registry()
        .find(asset_id)
        .ok_or_else(|| anyhow!("Unknown asset: {}", asset_id))?
        .clone();

    info!(asset = %asset.id, days, "Fetching price series");
    let pb = ui::new_spinner(&format!("Fetching {} prices...", asset.id));
    let series = service.price_series(&asset, days).await;
    pb.finish_and_clear();
    let series = series?;

    if json {
        println!("{}", serde_json::to_string_pretty(&series)?);
    } else {
        println!("{}", render(&asset, &series));
    }
    Ok(())
}
