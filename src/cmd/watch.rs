//! Watch command - recompute on a fixed interval, reloading the ledger each time

use super::{read_ledger, EngineArgs};
use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Args;
use taxlot::scheduler::Scheduler;

/// One week
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Args, Debug)]
pub struct WatchCommand {
    #[command(flatten)]
    engine: EngineArgs,

    /// Seconds between runs (at most one week)
    #[arg(
        long,
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_SECS)
    )]
    interval_secs: u64,

    /// Stop after this many runs (default: run until interrupted)
    #[arg(long)]
    runs: Option<usize>,
}

impl WatchCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let request = self.engine.request()?;
        let interval = i64::try_from(self.interval_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .context("interval too large")?;
        let mut scheduler = Scheduler::new(request, interval);
        let mut completed = 0;

        log::info!(
            "Watching {} every {}s",
            self.engine.ledger_path().display(),
            self.interval_secs
        );

        loop {
            let now = Utc::now();
            match read_ledger(self.engine.ledger_path()) {
                Ok(ledger) => {
                    scheduler.run_once(&ledger, now);
                }
                Err(err) => {
                    scheduler.record_failure(now, format!("failed to load ledger: {:#}", err));
                }
            }
            println!("{}", serde_json::to_string_pretty(&scheduler.status())?);

            completed += 1;
            if self.runs.is_some_and(|runs| completed >= runs) {
                break;
            }
            std::thread::sleep(scheduler.interval().to_std()?);
        }

        Ok(())
    }
}
