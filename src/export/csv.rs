use super::{display_money, CsvField};
use crate::core::{IncomeRecord, RealizedGainRecord, TaxComputationResult, TaxLot};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use taxlot_derive::CsvColumns;

#[derive(Serialize, CsvColumns)]
#[csv(title = "Realized Gains")]
struct GainRow {
    /// Disposal time (RFC 3339)
    timestamp: String,
    venue: String,
    asset: String,
    /// Quantity disposed
    quantity: String,
    /// Proceeds in base currency
    proceeds: String,
    /// Cost basis of the consumed lots in base currency
    cost_basis: String,
    /// Proceeds minus cost basis
    gain_loss: String,
}

impl From<&RealizedGainRecord> for GainRow {
    fn from(gain: &RealizedGainRecord) -> Self {
        GainRow {
            timestamp: gain.timestamp.to_rfc3339(),
            venue: gain.venue.clone(),
            asset: gain.asset.clone(),
            quantity: display_quantity(gain.quantity),
            proceeds: display_money(gain.proceeds),
            cost_basis: display_money(gain.cost_basis),
            gain_loss: display_money(gain.gain_loss),
        }
    }
}

#[derive(Serialize, CsvColumns)]
#[csv(title = "Income Events")]
struct IncomeRow {
    /// Receipt time (RFC 3339)
    timestamp: String,
    venue: String,
    /// staking_reward, interest or airdrop
    #[serde(rename = "type")]
    income_type: String,
    asset: String,
    /// Quantity received
    amount: String,
    /// Value at receipt in base currency
    value_in_base: String,
}

impl From<&IncomeRecord> for IncomeRow {
    fn from(income: &IncomeRecord) -> Self {
        IncomeRow {
            timestamp: income.timestamp.to_rfc3339(),
            venue: income.venue.clone(),
            income_type: income.income_type.as_str().to_string(),
            asset: income.asset.clone(),
            amount: display_quantity(income.quantity),
            value_in_base: display_money(income.value),
        }
    }
}

#[derive(Serialize, CsvColumns)]
#[csv(title = "Open Lots")]
struct LotRow {
    /// Acquisition time (RFC 3339)
    acquired_at: String,
    venue: String,
    asset: String,
    /// Quantity at acquisition
    original_quantity: String,
    /// Quantity not yet disposed
    remaining_quantity: String,
    /// Total acquisition cost in base currency
    acquisition_value: String,
}

impl From<&TaxLot> for LotRow {
    fn from(lot: &TaxLot) -> Self {
        LotRow {
            acquired_at: lot.acquired_at.to_rfc3339(),
            venue: lot.venue.clone(),
            asset: lot.asset.clone(),
            original_quantity: display_quantity(lot.quantity),
            remaining_quantity: display_quantity(lot.remaining_quantity),
            acquisition_value: display_money(lot.acquisition_value),
        }
    }
}

fn display_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

/// Titles and columns of the export tables, in output order
pub fn csv_columns() -> Vec<(&'static str, &'static [CsvField])> {
    vec![
        (GainRow::csv_title(), GainRow::csv_schema()),
        (IncomeRow::csv_title(), IncomeRow::csv_schema()),
        (LotRow::csv_title(), LotRow::csv_schema()),
    ]
}

/// Write the report as a header block followed by the realized gains, income
/// events and open lots tables. Each table is preceded by its title and column
/// header, even when empty.
pub fn write_csv<W>(result: &TaxComputationResult, writer: W) -> anyhow::Result<()>
where
    W: Write,
{
    let mut wtr = ::csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(writer);

    let summary = result.summary();
    wtr.write_record(["generated_at", result.metadata.generated_at.to_rfc3339().as_str()])?;
    wtr.write_record(["realized_gains_total", display_money(summary.realized_gains).as_str()])?;
    wtr.write_record(["income_total", display_money(summary.income).as_str()])?;
    wtr.write_record(["base_currency", summary.base_currency.as_str()])?;
    wtr.write_record(["cost_basis", result.metadata.cost_basis.as_str()])?;

    wtr.write_record([GainRow::csv_title()])?;
    wtr.write_record(GainRow::csv_header())?;
    for gain in &result.realized_gains {
        wtr.serialize(GainRow::from(gain))?;
    }

    wtr.write_record([IncomeRow::csv_title()])?;
    wtr.write_record(IncomeRow::csv_header())?;
    for income in &result.income {
        wtr.serialize(IncomeRow::from(income))?;
    }

    wtr.write_record([LotRow::csv_title()])?;
    wtr.write_record(LotRow::csv_header())?;
    for lot in result.open_lots() {
        wtr.serialize(LotRow::from(lot))?;
    }

    wtr.flush()?;
    Ok(())
}
