//! Reference data supplied alongside the ledger: FX rates, market prices and
//! venue balance snapshots.

use super::transaction::deserialize_datetime;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Exchange-rate observation: one unit of `base_currency` is worth `rate` units
/// of `quote_currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FxRate {
    pub base_currency: String,
    pub quote_currency: String,
    #[schemars(with = "f64")]
    pub rate: Decimal,
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub captured_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Market price observation for an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketPrice {
    pub asset: String,
    pub quote_currency: String,
    #[schemars(with = "f64")]
    pub price: Decimal,
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub captured_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Balance reported by a venue at a point in time. Independent of the lot ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub venue: String,
    pub asset: String,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    /// Value of the balance, in `currency`
    #[schemars(with = "f64")]
    pub value: Decimal,
    pub currency: String,
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub captured_at: DateTime<FixedOffset>,
}

/// Whether `at` falls inside the inclusive window; a missing bound is open.
pub fn within_window(
    at: DateTime<FixedOffset>,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
) -> bool {
    start.is_none_or(|s| at >= s) && end.is_none_or(|e| at <= e)
}
