use super::ui;
use crate::core::broker::AccountProvider;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use futures::future::try_join;
use std::collections::HashMap;

/// Shows how far the account currently sits from its target weights.
pub async fn run(
    targets: &HashMap<String, f64>,
    account: &(dyn AccountProvider + Send + Sync),
) -> Result<()> {
    let pb = ui::new_spinner("Fetching account snapshot...");
    let fetched = try_join(account.fetch_cash_balance(), account.fetch_positions()).await;
    pb.finish_and_clear();
    let (cash, holdings) = fetched?;

    let total: f64 = holdings.values().sum::<f64>() + cash;
    let total_weight: f64 = targets.values().filter(|w| **w > 0.0).sum();

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Value"),
        ui::header_cell("Weight"),
        ui::header_cell("Target"),
        ui::header_cell("Drift"),
    ]);

    let weight_of = |value: f64| if total > 0.0 { value / total * 100.0 } else { 0.0 };

    let mut symbols: Vec<&String> = targets.keys().collect();
    symbols.sort();
    for symbol in symbols {
        let value = holdings.get(symbol).copied().unwrap_or(0.0);
        let weight = weight_of(value);
        let target = if total_weight > 0.0 {
            targets[symbol].max(0.0) / total_weight * 100.0
        } else {
            0.0
        };
        table.add_row(vec![
            Cell::new(symbol),
            Cell::new(format!("{value:.2}")).set_alignment(CellAlignment::Right),
            Cell::new(format!("{weight:.2}%")).set_alignment(CellAlignment::Right),
            Cell::new(format!("{target:.2}%")).set_alignment(CellAlignment::Right),
            ui::change_cell(weight - target),
        ]);
    }

    // Holdings outside the target allocation still shape the weights.
    let mut untracked: Vec<(&String, f64)> = holdings
        .iter()
        .filter(|(symbol, _)| !targets.contains_key(*symbol))
        .map(|(symbol, value)| (symbol, *value))
        .collect();
    untracked.sort_by(|a, b| a.0.cmp(b.0));
    for (symbol, value) in untracked {
        let weight = weight_of(value);
        table.add_row(vec![
            Cell::new(symbol),
            Cell::new(format!("{value:.2}")).set_alignment(CellAlignment::Right),
            Cell::new(format!("{weight:.2}%")).set_alignment(CellAlignment::Right),
            Cell::new("-").set_alignment(CellAlignment::Right),
            ui::change_cell(weight),
        ]);
    }

    table.add_row(vec![
        Cell::new("Cash"),
        Cell::new(format!("{cash:.2}")).set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.2}%", weight_of(cash))).set_alignment(CellAlignment::Right),
        Cell::new("-").set_alignment(CellAlignment::Right),
        Cell::new(""),
    ]);

    println!(
        "{}\n\n{table}",
        ui::style_text("Allocation status", ui::StyleType::Title)
    );
    println!(
        "\n{}: {}",
        ui::style_text("Total value", ui::StyleType::TotalLabel),
        ui::style_text(&format!("{total:.2}"), ui::StyleType::TotalValue)
    );

    Ok(())
}
