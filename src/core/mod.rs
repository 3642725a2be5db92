pub mod engine;
pub mod filter;
pub mod fx;
pub mod lots;
pub mod reference;
pub mod report;
pub mod transaction;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use engine::{compute, compute_at, EngineError, EngineRequest, RequestParams};
pub use filter::TransactionFilter;
pub use fx::{CurrencyConverter, MissingRateError, RatePolicy};
pub use lots::{
    match_lots, CostBasisMethod, IncomeRecord, IncomeType, LotConsumption, LotMatcher,
    MatchError, MatchOutcome, RealizedGainRecord, ShortfallPolicy, TaxLot,
};
pub use reference::{BalanceSnapshot, FxRate, MarketPrice};
pub use report::{HoldingsSnapshotRecord, ReportSummary, TaxComputationResult};
pub use transaction::{
    read_ledger_json, Ledger, Side, TransactionKind, ValidationError, VenueTransaction,
};
pub use warnings::Warning;
