pub mod export;
pub mod report;
pub mod schema;
pub mod validate;
pub mod watch;

use clap::{Args, ValueEnum};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use taxlot::core::{
    compute, read_ledger_json, EngineRequest, Ledger, RatePolicy, RequestParams,
    ShortfallPolicy, TaxComputationResult,
};

/// Read a ledger JSON file (or stdin with "-")
pub fn read_ledger(path: &Path) -> anyhow::Result<Ledger> {
    if path.as_os_str() == "-" {
        read_from_stdin()
    } else {
        let file = File::open(path)?;
        read_ledger_json(BufReader::new(file))
    }
}

fn read_from_stdin() -> anyhow::Result<Ledger> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }

    read_ledger_json(io::Cursor::new(buffer))
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum MethodArg {
    #[default]
    Fifo,
    Lifo,
    Hifo,
}

impl MethodArg {
    fn as_str(self) -> &'static str {
        match self {
            MethodArg::Fifo => "FIFO",
            MethodArg::Lifo => "LIFO",
            MethodArg::Hifo => "HIFO",
        }
    }
}

/// Ledger input and engine configuration shared by the computing commands
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// JSON ledger file (transactions, balances, fxRates, marketPrices), or "-" for stdin
    #[arg(short, long)]
    ledger: PathBuf,

    /// Cost-basis method
    #[arg(short, long, value_enum, default_value_t = MethodArg::Fifo)]
    method: MethodArg,

    /// Reporting currency
    #[arg(short, long, default_value = "USD")]
    base: String,

    /// Start of the reporting window (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    start: Option<String>,

    /// End of the reporting window; a bare date includes the whole day
    #[arg(long)]
    end: Option<String>,

    /// Only include these venues (repeatable)
    #[arg(long = "venue")]
    venues: Vec<String>,

    /// Jurisdiction label for report headers
    #[arg(long)]
    jurisdiction: Option<String>,

    /// Fail when an FX rate is missing instead of converting 1:1
    #[arg(long)]
    strict_rates: bool,

    /// Fail when open lots do not cover a disposal
    #[arg(long)]
    reject_shortfall: bool,
}

impl EngineArgs {
    pub fn params(&self) -> RequestParams {
        RequestParams {
            cost_basis: Some(self.method.as_str().to_string()),
            base_currency: Some(self.base.clone()),
            start_date: self.start.clone(),
            end_date: self.end.clone(),
            venues: self.venues.clone(),
            jurisdiction: self.jurisdiction.clone(),
            rate_policy: if self.strict_rates {
                RatePolicy::Strict
            } else {
                RatePolicy::Fallback
            },
            shortfall_policy: if self.reject_shortfall {
                ShortfallPolicy::Reject
            } else {
                ShortfallPolicy::ZeroCost
            },
        }
    }

    pub fn request(&self) -> anyhow::Result<EngineRequest> {
        Ok(EngineRequest::parse(self.params())?)
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger
    }

    /// Load the ledger and run the engine once
    pub fn compute(&self) -> anyhow::Result<TaxComputationResult> {
        let request = self.request()?;
        let ledger = read_ledger(&self.ledger)?;
        Ok(compute(&ledger, &request)?)
    }
}
