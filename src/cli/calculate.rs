use super::prices::preview;
use super::ui;
use crate::core::projection::{ProjectionRequest, ProjectionService};
use crate::core::simulator::{Resolution, SimulationResult};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use tracing::info;

const CURVE_ROWS: usize = 12;

fn plan_label(request: &ProjectionRequest) -> String {
    match (request.investment_type.as_deref(), request.frequency.as_deref()) {
        (Some("recurring"), Some(frequency)) => format!("recurring ({frequency})"),
        (Some(kind), _) => kind.to_string(),
        (None, _) => "N/A".to_string(),
    }
}

pub fn render(request: &ProjectionRequest, result: &SimulationResult) -> String {
    let mut summary = ui::new_styled_table();
    summary.set_header(vec![
        ui::header_cell("Asset"),
        ui::header_cell("Plan"),
        ui::header_cell("Invested"),
        ui::header_cell("Final value"),
        ui::header_cell("CAGR"),
        ui::header_cell("Yield"),
    ]);
    summary.add_row(vec![
        Cell::new(&request.asset),
        Cell::new(plan_label(request)),
        ui::amount_cell(result.total_invested),
        ui::amount_cell(result.final_value),
        ui::change_cell(result.cagr),
        ui::change_cell(result.yield_rate),
    ]);

    let mut curve = ui::new_styled_table();
    curve.set_header(vec![
        ui::header_cell("Years"),
        ui::header_cell("Invested"),
        ui::header_cell("Value"),
    ]);
    let invested = preview(&result.invested_curve, CURVE_ROWS);
    let value = preview(&result.value_curve, CURVE_ROWS);
    for (paid, held) in invested.into_iter().zip(value) {
        curve.add_row(vec![
            Cell::new(format!("{:.2}", paid.x)).set_alignment(CellAlignment::Right),
            ui::amount_cell(paid.y),
            ui::amount_cell(held.y),
        ]);
    }

    let years = request
        .years_ago
        .map_or_else(|| "?".to_string(), |y| y.to_string());
    format!(
        "Projection: {} over {} years\n\n{}\n\n{}\n{}",
        ui::style_text(&request.asset, ui::StyleType::Title),
        years,
        summary,
        curve,
        ui::style_text(
            &format!("{} chart points", result.value_curve.len()),
            ui::StyleType::Subtle
        )
    )
}

pub async fn run(
    service: &ProjectionService,
    request: &ProjectionRequest,
    resolution: Option<Resolution>,
    json: bool,
) -> Result<()> {
    info!(asset = %request.asset, "Calculating projection");

    let pb = ui::new_spinner("Fetching prices and simulating...");
    let result = match resolution {
        Some(resolution) => service.project_with(request, resolution).await,
        None => service.project(request).await,
    };
    pb.finish_and_clear();
    let result = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render(request, &result));
        println!(
            "\n{}: {}",
            ui::style_text("Final value", ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_amount(result.final_value), ui::StyleType::TotalValue)
        );
    }
    Ok(())
}
