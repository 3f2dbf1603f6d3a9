use super::ui;
use crate::core::allocation::{PurchasePlan, compute_plan};
use crate::core::broker::{AccountProvider, QuoteProvider, Quotes};
use crate::core::notify::Notifier;
use crate::core::orders::{OrderExecutor, tickets_from_plan};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use futures::future::try_join3;
use std::collections::HashMap;
use tracing::{debug, info};

pub async fn run(
    targets: &HashMap<String, f64>,
    account: &(dyn AccountProvider + Send + Sync),
    quote_provider: &(dyn QuoteProvider + Send + Sync),
    executor: &(dyn OrderExecutor + Send + Sync),
    notifier: &(dyn Notifier + Send + Sync),
    dry_run: bool,
) -> Result<()> {
    let mut symbols: Vec<String> = targets.keys().cloned().collect();
    symbols.sort();

    let pb = ui::new_spinner("Fetching account snapshot...");
    let fetched = try_join3(
        account.fetch_cash_balance(),
        account.fetch_positions(),
        quote_provider.fetch_quotes(&symbols),
    )
    .await;
    pb.finish_and_clear();
    let (cash, holdings, quotes) = fetched?;

    info!("Available cash: {cash:.2}");
    debug!(?holdings, ?quotes, "account snapshot");

    let plan = compute_plan(&holdings, targets, cash, &quotes)?;
    println!("{}", render_plan(&plan, &quotes, cash));

    if plan.is_empty() {
        info!("Nothing to buy this run");
    } else if dry_run {
        info!("Dry run: orders not placed");
    } else {
        for ticket in tickets_from_plan(&plan, &quotes) {
            executor.submit(&ticket).await?;
        }
    }

    notifier
        .notify("Rebalance purchase plan", &plan_report(&plan, cash))
        .await
}

fn render_plan(plan: &PurchasePlan, quotes: &Quotes, cash: f64) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Shares"),
        ui::header_cell("Price"),
        ui::header_cell("Est. Cost"),
    ]);

    for purchase in &plan.purchases {
        let price = quotes.get(&purchase.symbol).copied().unwrap_or(0.0);
        table.add_row(vec![
            Cell::new(&purchase.symbol),
            Cell::new(purchase.shares).set_alignment(CellAlignment::Right),
            Cell::new(format!("{price:.2}")).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", purchase.estimated_cost))
                .set_alignment(CellAlignment::Right),
        ]);
    }

    let mut output = format!(
        "{}\n\n",
        ui::style_text("Purchase plan", ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\n{}: {}",
        ui::style_text("Total to invest", ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", plan.total_cost()), ui::StyleType::TotalValue),
    ));
    output.push_str(&format!(
        "\n{}",
        ui::style_text(
            &format!(
                "Cash left after purchases: {:.2} (of {cash:.2})",
                plan.remaining_cash
            ),
            ui::StyleType::Subtle
        )
    ));
    for symbol in &plan.skipped {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                &format!("No usable price for {symbol}; skipped"),
                ui::StyleType::Error
            )
        ));
    }
    output
}

fn plan_report(plan: &PurchasePlan, cash: f64) -> String {
    if plan.is_empty() {
        return format!(
            "No purchases planned; {:.2} of {cash:.2} cash remains uninvested.",
            plan.remaining_cash
        );
    }

    let mut lines: Vec<String> = plan
        .purchases
        .iter()
        .map(|p| format!("{}: {} shares, est. {:.2}", p.symbol, p.shares, p.estimated_cost))
        .collect();
    lines.push(format!(
        "Total {:.2}, remaining cash {:.2}",
        plan.total_cost(),
        plan.remaining_cash
    ));
    for symbol in &plan.skipped {
        lines.push(format!("{symbol} skipped: no usable price"));
    }
    lines.join("\n")
}
