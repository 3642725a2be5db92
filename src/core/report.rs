use super::engine::EngineRequest;
use super::fx::{CurrencyConverter, MissingRateError, RatePolicy, RateSource};
use super::lots::{CostBasisMethod, IncomeRecord, MatchOutcome, RealizedGainRecord, ShortfallPolicy, TaxLot};
use super::reference::{FxRate, MarketPrice};
use super::transaction::Ledger;
use super::warnings::Warning;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Venue balance expressed in base currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsSnapshotRecord {
    pub venue: String,
    pub asset: String,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[schemars(with = "f64")]
    pub value: Decimal,
    pub currency: String,
    #[schemars(with = "String")]
    pub captured_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    #[schemars(with = "Option<String>")]
    pub start_date: Option<DateTime<FixedOffset>>,
    #[schemars(with = "Option<String>")]
    pub end_date: Option<DateTime<FixedOffset>>,
    pub venues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    #[schemars(with = "String")]
    pub generated_at: DateTime<Utc>,
    pub cost_basis: CostBasisMethod,
    pub base_currency: String,
    /// Label for report headers only; no rules are derived from it
    pub jurisdiction: Option<String>,
    pub filters: AppliedFilters,
    pub rate_policy: RatePolicy,
    pub shortfall_policy: ShortfallPolicy,
    pub transactions_evaluated: usize,
}

/// Output of one engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaxComputationResult {
    pub metadata: ReportMetadata,
    pub lots: Vec<TaxLot>,
    pub realized_gains: Vec<RealizedGainRecord>,
    pub income: Vec<IncomeRecord>,
    pub holdings: Vec<HoldingsSnapshotRecord>,
    pub fx_rates: Vec<FxRate>,
    pub market_prices: Vec<MarketPrice>,
    pub transactions_evaluated: usize,
    pub warnings: Vec<Warning>,
}

/// Totals derived from a result, shared by renderers and the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub base_currency: String,
    #[schemars(with = "f64")]
    pub realized_gains: Decimal,
    #[schemars(with = "f64")]
    pub income: Decimal,
    #[schemars(with = "f64")]
    pub holdings_value: Decimal,
    pub transactions_evaluated: usize,
    pub disposal_count: usize,
    pub income_count: usize,
    pub lot_count: usize,
    pub open_lot_count: usize,
}

impl TaxComputationResult {
    pub fn total_realized(&self) -> Decimal {
        self.realized_gains.iter().map(|g| g.gain_loss).sum()
    }

    pub fn total_income(&self) -> Decimal {
        self.income.iter().map(|i| i.value).sum()
    }

    pub fn holdings_value(&self) -> Decimal {
        self.holdings.iter().map(|h| h.value).sum()
    }

    pub fn open_lots(&self) -> impl Iterator<Item = &TaxLot> {
        self.lots.iter().filter(|lot| lot.is_open())
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            base_currency: self.metadata.base_currency.clone(),
            realized_gains: self.total_realized(),
            income: self.total_income(),
            holdings_value: self.holdings_value(),
            transactions_evaluated: self.transactions_evaluated,
            disposal_count: self.realized_gains.len(),
            income_count: self.income.len(),
            lot_count: self.lots.len(),
            open_lot_count: self.open_lots().count(),
        }
    }

    /// SHA-256 over the computed arrays; `generatedAt` does not take part.
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let computed = (&self.lots, &self.realized_gains, &self.income, &self.holdings);
        let bytes = serde_json::to_vec(&computed)?;
        Ok(hex::encode(Sha256::digest(bytes)))
    }
}

/// Package matcher output with holdings and reference data for the window.
pub fn assemble_report(
    outcome: MatchOutcome,
    ledger: &Ledger,
    request: &EngineRequest,
    converter: CurrencyConverter<'_>,
    transactions_evaluated: usize,
    now: DateTime<Utc>,
) -> Result<TaxComputationResult, MissingRateError> {
    let MatchOutcome {
        lots,
        realized_gains,
        income,
        mut warnings,
    } = outcome;
    let filter = request.filter();

    let mut holdings = Vec::new();
    for balance in ledger.balances.iter().filter(|b| filter.allows_venue(&b.venue)) {
        let conversion = converter.convert_detailed(
            balance.value,
            &balance.currency,
            &request.base_currency,
            balance.captured_at,
        )?;
        if conversion.source == RateSource::Fallback {
            let warning = Warning::FallbackRate {
                from: balance.currency.to_uppercase(),
                to: request.base_currency.to_uppercase(),
            };
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }
        holdings.push(HoldingsSnapshotRecord {
            venue: balance.venue.clone(),
            asset: balance.asset.clone(),
            quantity: balance.quantity,
            value: conversion.value,
            currency: request.base_currency.clone(),
            captured_at: balance.captured_at,
        });
    }

    let fx_rates = ledger
        .fx_rates
        .iter()
        .filter(|r| filter.allows_time(r.captured_at))
        .cloned()
        .collect();
    let market_prices = ledger
        .market_prices
        .iter()
        .filter(|p| filter.allows_time(p.captured_at))
        .cloned()
        .collect();

    Ok(TaxComputationResult {
        metadata: ReportMetadata {
            generated_at: now,
            cost_basis: request.cost_basis,
            base_currency: request.base_currency.clone(),
            jurisdiction: request.jurisdiction.clone(),
            filters: AppliedFilters {
                start_date: filter.start_date,
                end_date: filter.end_date,
                venues: filter.venues,
            },
            rate_policy: request.rate_policy,
            shortfall_policy: request.shortfall_policy,
            transactions_evaluated,
        },
        lots,
        realized_gains,
        income,
        holdings,
        fx_rates,
        market_prices,
        transactions_evaluated,
        warnings,
    })
}
