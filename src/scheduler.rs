//! Periodic re-runs of the engine with a fixed configuration.
//!
//! The scheduler only records what each run produced; driving the clock is up
//! to the caller (see the `watch` command). Runs are sequential, so a run
//! always completes before the next one is due.

use crate::core::{compute_at, EngineRequest, Ledger};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Number of runs kept in history
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub realized_gains: Decimal,
    pub income: Decimal,
    pub base_currency: String,
    pub holdings_value: Decimal,
    pub transactions_evaluated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded { summary: RunSummary, warnings: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub status: RunState,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub interval_ms: i64,
    pub last_summary: Option<RunSummary>,
    pub run_history: Vec<RunRecord>,
}

pub struct Scheduler {
    request: EngineRequest,
    interval: Duration,
    state: RunState,
    last_run_at: Option<DateTime<Utc>>,
    next_run_at: Option<DateTime<Utc>>,
    last_summary: Option<RunSummary>,
    history: VecDeque<RunRecord>,
}

impl Scheduler {
    pub fn new(request: EngineRequest, interval: Duration) -> Self {
        Scheduler {
            request,
            interval,
            state: RunState::Idle,
            last_run_at: None,
            next_run_at: None,
            last_summary: None,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a run is due at `now`. The first run is always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_run_at.is_none_or(|next| now >= next)
    }

    /// Run the engine once over `ledger` and record the outcome.
    pub fn run_once(&mut self, ledger: &Ledger, now: DateTime<Utc>) -> &RunRecord {
        self.state = RunState::Running;

        let outcome = match compute_at(ledger, &self.request, now) {
            Ok(result) => {
                let summary = result.summary();
                let summary = RunSummary {
                    realized_gains: summary.realized_gains,
                    income: summary.income,
                    base_currency: summary.base_currency,
                    holdings_value: summary.holdings_value,
                    transactions_evaluated: summary.transactions_evaluated,
                };
                log::info!(
                    "Scheduled run: realized {} {}, income {}",
                    summary.realized_gains.round_dp(2),
                    summary.base_currency,
                    summary.income.round_dp(2)
                );
                self.last_summary = Some(summary.clone());
                RunOutcome::Succeeded {
                    summary,
                    warnings: result.warnings.len(),
                }
            }
            Err(err) => {
                log::error!("Scheduled run failed: {}", err);
                RunOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };

        self.finish(now, outcome)
    }

    /// Record a run that never reached the engine, e.g. the ledger failed to
    /// load. The last successful summary is kept.
    pub fn record_failure(&mut self, now: DateTime<Utc>, error: impl fmt::Display) -> &RunRecord {
        log::error!("Scheduled run failed: {}", error);
        self.finish(
            now,
            RunOutcome::Failed {
                error: error.to_string(),
            },
        )
    }

    fn finish(&mut self, now: DateTime<Utc>, outcome: RunOutcome) -> &RunRecord {
        self.last_run_at = Some(now);
        self.next_run_at = Some(now + self.interval);
        self.state = RunState::Idle;

        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        // runs are synchronous and timed by the caller's clock
        self.history.push_back(RunRecord {
            started_at: now,
            finished_at: now,
            outcome,
        });
        &self.history[self.history.len() - 1]
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            status: self.state,
            last_run_at: self.last_run_at,
            next_run_at: self.next_run_at,
            interval_ms: self.interval.num_milliseconds(),
            last_summary: self.last_summary.clone(),
            run_history: self.history.iter().cloned().collect(),
        }
    }
}
