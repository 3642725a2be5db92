//! Lot building and disposal matching.
//!
//! Transactions are processed once, in chronological order. Acquisitions and
//! yield events open lots; sells consume open lots on the same venue in the
//! order given by the cost-basis method. The lot list is owned by a single
//! [`LotMatcher`], so every computation starts from an empty book.

use super::fx::{CurrencyConverter, MissingRateError, RateSource};
use super::transaction::{TransactionKind, ValidationError, VenueTransaction};
use super::warnings::Warning;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Order in which open lots are consumed by a disposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CostBasisMethod {
    /// Oldest acquisition first
    #[default]
    Fifo,
    /// Newest acquisition first
    Lifo,
    /// Highest acquisition unit price first, regardless of date
    Hifo,
}

impl CostBasisMethod {
    /// Ordering of two candidate lots; `Less` is consumed first.
    fn compare(self, a: &TaxLot, b: &TaxLot) -> Ordering {
        match self {
            CostBasisMethod::Fifo => a.acquired_at.cmp(&b.acquired_at),
            CostBasisMethod::Lifo => b.acquired_at.cmp(&a.acquired_at),
            CostBasisMethod::Hifo => b.acquisition_price.cmp(&a.acquisition_price),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CostBasisMethod::Fifo => "FIFO",
            CostBasisMethod::Lifo => "LIFO",
            CostBasisMethod::Hifo => "HIFO",
        }
    }
}

impl FromStr for CostBasisMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FIFO" => Ok(CostBasisMethod::Fifo),
            "LIFO" => Ok(CostBasisMethod::Lifo),
            "HIFO" => Ok(CostBasisMethod::Hifo),
            _ => Err(ValidationError::UnknownCostBasis(s.to_string())),
        }
    }
}

impl fmt::Display for CostBasisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when open lots do not cover a disposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Unmatched quantity carries zero cost basis; a warning is recorded
    #[default]
    ZeroCost,
    /// Abort the computation
    Reject,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MatchError {
    #[error(transparent)]
    MissingRate(#[from] MissingRateError),
    #[error("insufficient open lots for {transaction_id}: required {required}, available {available}")]
    InsufficientLots {
        transaction_id: String,
        required: Decimal,
        available: Decimal,
    },
}

/// Quantity of one asset acquired at one time on one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaxLot {
    pub id: String,
    pub venue: String,
    pub asset: String,
    /// Quantity at acquisition
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    /// Quantity not yet consumed by disposals
    #[schemars(with = "f64")]
    pub remaining_quantity: Decimal,
    /// Unit price in the acquisition's quote currency
    #[schemars(with = "f64")]
    pub acquisition_price: Decimal,
    /// Total cost in base currency
    #[schemars(with = "f64")]
    pub acquisition_value: Decimal,
    #[schemars(with = "String")]
    pub acquired_at: DateTime<FixedOffset>,
    pub source_transaction_id: String,
}

impl TaxLot {
    pub fn is_open(&self) -> bool {
        self.remaining_quantity > Decimal::ZERO
    }

    /// Base-currency cost per unit, fixed at acquisition.
    pub fn unit_cost(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.acquisition_value / self.quantity
        }
    }

    /// Take up to `wanted` from the lot. Cost is prorated on the original
    /// quantity so partial consumption never shifts the unit cost.
    ///
    /// Multiplying before dividing keeps a full consumption exact; when the
    /// product overflows, the unit cost is used instead, which cannot exceed
    /// the lot value since `quantity_consumed <= quantity`.
    fn consume(&mut self, wanted: Decimal) -> LotConsumption {
        let quantity_consumed = wanted.min(self.remaining_quantity);
        self.remaining_quantity -= quantity_consumed;
        let cost_basis_portion = match self.acquisition_value.checked_mul(quantity_consumed) {
            Some(product) => product / self.quantity,
            None => self.unit_cost() * quantity_consumed,
        };
        log::debug!(
            "Lot {} CONSUME: qty={}, cost={}. Remaining: {}",
            self.id,
            quantity_consumed,
            cost_basis_portion,
            self.remaining_quantity
        );
        LotConsumption {
            lot_id: self.id.clone(),
            quantity_consumed,
            cost_basis_portion,
        }
    }
}

/// One lot's contribution to a disposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LotConsumption {
    pub lot_id: String,
    #[schemars(with = "f64")]
    pub quantity_consumed: Decimal,
    #[schemars(with = "f64")]
    pub cost_basis_portion: Decimal,
}

/// Outcome of matching one disposal against open lots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RealizedGainRecord {
    pub id: String,
    pub source_transaction_id: String,
    pub venue: String,
    pub asset: String,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[schemars(with = "f64")]
    pub proceeds: Decimal,
    #[schemars(with = "f64")]
    pub cost_basis: Decimal,
    #[schemars(with = "f64")]
    pub gain_loss: Decimal,
    pub currency: String,
    #[schemars(with = "String")]
    pub timestamp: DateTime<FixedOffset>,
    pub breakdown: Vec<LotConsumption>,
    /// Disposed quantity not covered by any open lot (zero cost basis)
    #[schemars(with = "f64")]
    pub unmatched_quantity: Decimal,
}

impl RealizedGainRecord {
    pub fn matched_quantity(&self) -> Decimal {
        self.breakdown.iter().map(|c| c.quantity_consumed).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncomeType {
    StakingReward,
    Interest,
    Airdrop,
}

impl IncomeType {
    fn from_kind(kind: TransactionKind) -> Option<IncomeType> {
        match kind {
            TransactionKind::StakingReward => Some(IncomeType::StakingReward),
            TransactionKind::Interest => Some(IncomeType::Interest),
            TransactionKind::Airdrop => Some(IncomeType::Airdrop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncomeType::StakingReward => "staking_reward",
            IncomeType::Interest => "interest",
            IncomeType::Airdrop => "airdrop",
        }
    }
}

/// Yield-type inflow recognized at receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncomeRecord {
    pub id: String,
    pub source_transaction_id: String,
    pub venue: String,
    pub asset: String,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    /// Value in base currency
    #[schemars(with = "f64")]
    pub value: Decimal,
    pub currency: String,
    #[schemars(with = "String")]
    pub timestamp: DateTime<FixedOffset>,
    pub income_type: IncomeType,
}

/// Everything the matcher produced in one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub lots: Vec<TaxLot>,
    pub realized_gains: Vec<RealizedGainRecord>,
    pub income: Vec<IncomeRecord>,
    pub warnings: Vec<Warning>,
}

/// Lot book for a single computation
pub struct LotMatcher<'a> {
    method: CostBasisMethod,
    base_currency: &'a str,
    converter: CurrencyConverter<'a>,
    shortfall: ShortfallPolicy,
    outcome: MatchOutcome,
    fallback_pairs: BTreeSet<(String, String)>,
}

impl<'a> LotMatcher<'a> {
    pub fn new(
        method: CostBasisMethod,
        base_currency: &'a str,
        converter: CurrencyConverter<'a>,
        shortfall: ShortfallPolicy,
    ) -> Self {
        LotMatcher {
            method,
            base_currency,
            converter,
            shortfall,
            outcome: MatchOutcome::default(),
            fallback_pairs: BTreeSet::new(),
        }
    }

    /// Apply one transaction. Must be called in chronological order.
    pub fn process(&mut self, tx: &VenueTransaction) -> Result<(), MatchError> {
        match tx.kind {
            TransactionKind::Trade if tx.is_buy() => self.buy(tx),
            TransactionKind::Trade if tx.is_sell() => self.sell(tx),
            // side is checked at the boundary
            TransactionKind::Trade => Ok(()),
            TransactionKind::TransferIn => self.transfer_in(tx),
            TransactionKind::StakingReward | TransactionKind::Interest | TransactionKind::Airdrop => {
                self.receive_income(tx)
            }
            TransactionKind::TransferOut | TransactionKind::Fee => {
                // Not a disposal here; a transfer to another custodial venue
                // arguably should carry its lots along. Left as is and surfaced.
                log::warn!("{} {} left out of lot matching", tx.kind, tx.id);
                self.outcome.warnings.push(Warning::OutflowNotModelled {
                    transaction_id: tx.id.clone(),
                    kind: tx.kind.to_string(),
                });
                Ok(())
            }
        }
    }

    pub fn finish(mut self) -> MatchOutcome {
        for (from, to) in std::mem::take(&mut self.fallback_pairs) {
            self.outcome.warnings.push(Warning::FallbackRate { from, to });
        }
        self.outcome
    }

    fn buy(&mut self, tx: &VenueTransaction) -> Result<(), MatchError> {
        if self.skip_zero_quantity(tx) {
            return Ok(());
        }
        // Fee-inclusive settled value is the cost; price x quantity when absent
        let value = match tx.settled_value() {
            v if v.is_zero() => tx.price.unwrap_or_default() * tx.quantity,
            v => v,
        };
        let acquisition_value = self.to_base(value, &tx.quote_asset, tx.venue_timestamp)?;
        self.open_lot(tx, tx.unit_price_or(value), acquisition_value);
        Ok(())
    }

    fn transfer_in(&mut self, tx: &VenueTransaction) -> Result<(), MatchError> {
        if self.skip_zero_quantity(tx) {
            return Ok(());
        }
        let acquisition_value =
            self.to_base(tx.gross_value, &tx.quote_asset, tx.venue_timestamp)?;
        self.open_lot(tx, tx.unit_price_or(tx.gross_value), acquisition_value);
        Ok(())
    }

    fn receive_income(&mut self, tx: &VenueTransaction) -> Result<(), MatchError> {
        let Some(income_type) = IncomeType::from_kind(tx.kind) else {
            return Ok(());
        };
        let received = tx.settled_value();
        let value = self.to_base(received, &tx.quote_asset, tx.venue_timestamp)?;

        self.outcome.income.push(IncomeRecord {
            id: format!("income-{}", tx.id),
            source_transaction_id: tx.id.clone(),
            venue: tx.venue.clone(),
            asset: tx.base_asset.clone(),
            quantity: tx.quantity,
            value,
            currency: self.base_currency.to_string(),
            timestamp: tx.venue_timestamp,
            income_type,
        });

        // Cost basis of the rewarded asset is the income already recognized.
        // Pure currency income (zero quantity) has nothing to hold.
        if tx.quantity > Decimal::ZERO {
            self.open_lot(tx, tx.unit_price_or(received), value);
        }
        Ok(())
    }

    fn sell(&mut self, tx: &VenueTransaction) -> Result<(), MatchError> {
        if self.skip_zero_quantity(tx) {
            return Ok(());
        }

        let mut candidates: Vec<usize> = self
            .outcome
            .lots
            .iter()
            .enumerate()
            .filter(|(_, lot)| {
                lot.is_open()
                    && lot.asset.eq_ignore_ascii_case(&tx.base_asset)
                    && lot.venue.eq_ignore_ascii_case(&tx.venue)
            })
            .map(|(i, _)| i)
            .collect();
        let lots = &self.outcome.lots;
        candidates.sort_by(|&a, &b| self.method.compare(&lots[a], &lots[b]));

        let available: Decimal = candidates
            .iter()
            .map(|&i| lots[i].remaining_quantity)
            .sum();
        let unmatched_quantity = (tx.quantity - available).max(Decimal::ZERO);

        if unmatched_quantity > Decimal::ZERO {
            match self.shortfall {
                ShortfallPolicy::Reject => {
                    return Err(MatchError::InsufficientLots {
                        transaction_id: tx.id.clone(),
                        required: tx.quantity,
                        available,
                    })
                }
                ShortfallPolicy::ZeroCost => {
                    log::warn!(
                        "Disposal {} of {} {} on {} exceeds open lots ({}); remainder at zero cost",
                        tx.id,
                        tx.quantity,
                        tx.base_asset,
                        tx.venue,
                        available
                    );
                    self.outcome.warnings.push(Warning::InsufficientLots {
                        transaction_id: tx.id.clone(),
                        venue: tx.venue.clone(),
                        asset: tx.base_asset.clone(),
                        available,
                        required: tx.quantity,
                    });
                }
            }
        }

        let proceeds = self.to_base(tx.settled_value(), &tx.quote_asset, tx.venue_timestamp)?;

        let mut needed = tx.quantity;
        let mut breakdown = Vec::new();
        for i in candidates {
            if needed <= Decimal::ZERO {
                break;
            }
            let consumption = self.outcome.lots[i].consume(needed);
            needed -= consumption.quantity_consumed;
            breakdown.push(consumption);
        }

        let cost_basis: Decimal = breakdown.iter().map(|c| c.cost_basis_portion).sum();
        self.outcome.realized_gains.push(RealizedGainRecord {
            id: format!("gain-{}", tx.id),
            source_transaction_id: tx.id.clone(),
            venue: tx.venue.clone(),
            asset: tx.base_asset.clone(),
            quantity: tx.quantity,
            proceeds,
            cost_basis,
            gain_loss: proceeds - cost_basis,
            currency: self.base_currency.to_string(),
            timestamp: tx.venue_timestamp,
            breakdown,
            unmatched_quantity,
        });
        Ok(())
    }

    fn open_lot(&mut self, tx: &VenueTransaction, acquisition_price: Decimal, acquisition_value: Decimal) {
        let lot = TaxLot {
            id: format!("lot-{}", tx.id),
            venue: tx.venue.clone(),
            asset: tx.base_asset.clone(),
            quantity: tx.quantity,
            remaining_quantity: tx.quantity,
            acquisition_price,
            acquisition_value,
            acquired_at: tx.venue_timestamp,
            source_transaction_id: tx.id.clone(),
        };
        log::debug!(
            "Lot {} OPEN: {} {} on {} at cost {}",
            lot.id,
            lot.quantity,
            lot.asset,
            lot.venue,
            lot.acquisition_value
        );
        self.outcome.lots.push(lot);
    }

    fn skip_zero_quantity(&mut self, tx: &VenueTransaction) -> bool {
        if !tx.quantity.is_zero() {
            return false;
        }
        log::warn!("Skipping zero-quantity {} {}", tx.kind, tx.id);
        self.outcome.warnings.push(Warning::ZeroQuantity {
            transaction_id: tx.id.clone(),
        });
        true
    }

    fn to_base(
        &mut self,
        value: Decimal,
        from: &str,
        at: DateTime<FixedOffset>,
    ) -> Result<Decimal, MatchError> {
        let conversion = self
            .converter
            .convert_detailed(value, from, self.base_currency, at)?;
        if conversion.source == RateSource::Fallback {
            self.fallback_pairs
                .insert((from.to_uppercase(), self.base_currency.to_uppercase()));
        }
        Ok(conversion.value)
    }
}

/// Run the matcher over time-ordered transactions.
pub fn match_lots(
    transactions: &[&VenueTransaction],
    method: CostBasisMethod,
    base_currency: &str,
    converter: CurrencyConverter<'_>,
    shortfall: ShortfallPolicy,
) -> Result<MatchOutcome, MatchError> {
    let mut matcher = LotMatcher::new(method, base_currency, converter, shortfall);
    for tx in transactions {
        matcher.process(tx)?;
    }
    Ok(matcher.finish())
}
