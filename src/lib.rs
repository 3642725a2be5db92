//! Cost-basis lot matching for venue ledgers.
//!
//! [`crate::core::compute`] turns a [`crate::core::Ledger`] into a [`crate::core::TaxComputationResult`]:
//! tax lots, realized gains matched under FIFO, LIFO or HIFO, income records and
//! venue holdings, all normalized to one base currency. [`export`] renders the
//! result and [`scheduler`] re-runs the engine on an interval.

pub mod core;
pub mod export;
pub mod scheduler;
