//! Report command - realized gains, income and holdings as tables or JSON

use super::EngineArgs;
use clap::Args;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use taxlot::core::TaxComputationResult;
use taxlot::export::display_money;

#[derive(Args, Debug)]
pub struct ReportCommand {
    #[command(flatten)]
    engine: EngineArgs,

    /// Output the full result as JSON instead of tables
    #[arg(long)]
    json: bool,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let result = self.engine.compute()?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_report(&result);
        }
        Ok(())
    }
}

fn print_report(result: &TaxComputationResult) {
    let meta = &result.metadata;
    let summary = result.summary();

    println!();
    match &meta.jurisdiction {
        Some(jurisdiction) => println!(
            "TAX REPORT ({}, {}, {})",
            meta.cost_basis, meta.base_currency, jurisdiction
        ),
        None => println!("TAX REPORT ({}, {})", meta.cost_basis, meta.base_currency),
    }
    println!();
    println!("  Transactions evaluated: {}", summary.transactions_evaluated);
    println!(
        "  Realized gains:         {} ({} disposals)",
        display_money(summary.realized_gains),
        summary.disposal_count
    );
    println!(
        "  Income:                 {} ({} events)",
        display_money(summary.income),
        summary.income_count
    );
    println!(
        "  Holdings value:         {}",
        display_money(summary.holdings_value)
    );
    println!(
        "  Lots:                   {} ({} open)",
        summary.lot_count, summary.open_lot_count
    );
    println!();

    let gains: Vec<GainRow> = result
        .realized_gains
        .iter()
        .map(|g| GainRow {
            date: g.timestamp.format("%Y-%m-%d").to_string(),
            venue: g.venue.clone(),
            asset: g.asset.clone(),
            quantity: g.quantity.normalize().to_string(),
            proceeds: display_money(g.proceeds),
            cost_basis: display_money(g.cost_basis),
            gain_loss: display_money(g.gain_loss),
            lots: g.breakdown.len(),
        })
        .collect();
    print_table("REALIZED GAINS", gains);

    let income: Vec<IncomeRow> = result
        .income
        .iter()
        .map(|i| IncomeRow {
            date: i.timestamp.format("%Y-%m-%d").to_string(),
            venue: i.venue.clone(),
            income_type: i.income_type.as_str().to_string(),
            asset: i.asset.clone(),
            quantity: i.quantity.normalize().to_string(),
            value: display_money(i.value),
        })
        .collect();
    print_table("INCOME", income);

    let lots: Vec<LotRow> = result
        .open_lots()
        .map(|l| LotRow {
            acquired: l.acquired_at.format("%Y-%m-%d").to_string(),
            venue: l.venue.clone(),
            asset: l.asset.clone(),
            quantity: l.quantity.normalize().to_string(),
            remaining: l.remaining_quantity.normalize().to_string(),
            cost: display_money(l.acquisition_value),
        })
        .collect();
    print_table("OPEN LOTS", lots);

    if !result.warnings.is_empty() {
        println!("\u{26A0} {} warning(s), run `validate` for details", result.warnings.len());
        println!();
    }
}

fn print_table<T: Tabled>(title: &str, rows: Vec<T>) {
    println!("{}", title);
    if rows.is_empty() {
        println!("  (none)");
        println!();
        return;
    }
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
    println!();
}

#[derive(Debug, Clone, Tabled)]
struct GainRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Venue")]
    venue: String,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
    #[tabled(rename = "Gain/Loss")]
    gain_loss: String,
    #[tabled(rename = "Lots")]
    lots: usize,
}

#[derive(Debug, Clone, Tabled)]
struct IncomeRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Venue")]
    venue: String,
    #[tabled(rename = "Type")]
    income_type: String,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Debug, Clone, Tabled)]
struct LotRow {
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Venue")]
    venue: String,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
    #[tabled(rename = "Cost")]
    cost: String,
}
