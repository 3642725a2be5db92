//! Renderers for a computed [`TaxComputationResult`](crate::core::TaxComputationResult).

pub mod csv;
pub mod statement;

pub use self::csv::{csv_columns, write_csv};
pub use self::statement::{render_html, StatementDocument};

use rust_decimal::Decimal;

/// Column of a CSV export table
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CsvField {
    pub name: &'static str,
    pub description: &'static str,
}

/// Money rounded half away from zero, always with two decimal places.
pub fn display_money(value: Decimal) -> String {
    format!(
        "{:.2}",
        value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
    )
}
