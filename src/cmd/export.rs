//! Export command - CSV or printable statement

use super::EngineArgs;
use clap::{Args, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use taxlot::export::{render_html, write_csv, StatementDocument};

#[derive(Args, Debug)]
pub struct ExportCommand {
    #[command(flatten)]
    engine: EngineArgs,

    /// Export format
    #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
    format: ExportFormat,

    /// Output file path (default: stdout for CSV, opens the statement in a browser)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ExportFormat {
    /// Header block followed by gains, income and open lots tables
    #[default]
    Csv,
    /// Print-ready HTML statement
    Statement,
}

impl ExportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let result = self.engine.compute()?;

        match self.format {
            ExportFormat::Csv => match &self.output {
                Some(path) => {
                    write_csv(&result, BufWriter::new(File::create(path)?))?;
                    eprintln!("CSV export written to: {}", path.display());
                }
                None => write_csv(&result, io::stdout())?,
            },
            ExportFormat::Statement => {
                let html = render_html(&StatementDocument::from_result(&result)?);
                if let Some(ref output_path) = self.output {
                    std::fs::write(output_path, &html)?;
                    println!("Statement written to: {}", output_path.display());
                } else {
                    let temp_path = std::env::temp_dir().join("taxlot-statement.html");
                    std::fs::write(&temp_path, &html)?;
                    opener::open(&temp_path)?;
                    println!("Opened statement in browser: {}", temp_path.display());
                }
            }
        }

        Ok(())
    }
}
