use super::ui;
use crate::core::currency::{ExchangeRateService, ExchangeRates};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

pub fn render(rates: &ExchangeRates) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Pair"), ui::header_cell("Rate")]);
    for (quote, rate) in &rates.rates {
        table.add_row(vec![
            Cell::new(format!("{}/{}", rates.base, quote)),
            Cell::new(format!("{rate:.4}")).set_alignment(CellAlignment::Right),
        ]);
    }

    format!(
        "{}\n\n{}\n{}",
        ui::style_text("Exchange rates", ui::StyleType::Title),
        table,
        ui::style_text(
            &format!("As of {}", rates.cached_date),
            ui::StyleType::Subtle
        )
    )
}

pub async fn run(service: &ExchangeRateService, json: bool) -> Result<()> {
    let pb = ui::new_spinner("Fetching exchange rates...");
    let rates = service.usd_rates().await;
    pb.finish_and_clear();
    let rates = rates?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rates)?);
    } else {
        println!("{}", render(&rates));
    }
    Ok(())
}
