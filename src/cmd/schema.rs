//! Schema command - print the ledger input format and the CSV export columns

use clap::Args;
use schemars::schema_for;
use taxlot::core::{Ledger, RequestParams};
use taxlot::export::csv_columns;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the ledger input
    JsonSchema,
    /// JSON Schema for engine request parameters
    RequestSchema,
    /// CSV export header rows, one per table
    CsvHeader,
    /// CSV export column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                let schema = schema_for!(Ledger);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::RequestSchema => {
                let schema = schema_for!(RequestParams);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::CsvHeader => {
                for (_, fields) in csv_columns() {
                    let names: Vec<&str> = fields.iter().map(|f| f.name).collect();
                    println!("{}", names.join(","));
                }
            }
            SchemaFormat::CsvFields => print_csv_fields(),
        }
        Ok(())
    }
}

fn print_csv_fields() {
    println!("CSV Export Format");
    println!("=================");
    println!();
    println!("Header block: generated_at, realized_gains_total, income_total, base_currency, cost_basis");
    for (title, fields) in csv_columns() {
        println!();
        println!("{}", title);
        for field in fields {
            println!("  {:20}  {}", field.name, field.description);
        }
    }
    println!();
    println!("Monetary columns are in the base currency, rounded to 2 decimal places.");
}
