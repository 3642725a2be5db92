use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain warnings emitted while building lots and matching disposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    /// Open lots did not cover the disposal. The unmatched quantity carries
    /// zero cost basis. When `available = 0`, there was no cost basis at all.
    #[serde(rename_all = "camelCase")]
    InsufficientLots {
        transaction_id: String,
        venue: String,
        asset: String,
        #[schemars(with = "f64")]
        available: Decimal,
        #[schemars(with = "f64")]
        required: Decimal,
    },
    /// No FX observation for the pair; values were converted 1:1.
    FallbackRate { from: String, to: String },
    /// Outbound transfer or fee; neither a disposal nor a lot adjustment.
    #[serde(rename_all = "camelCase")]
    OutflowNotModelled {
        transaction_id: String,
        kind: String,
    },
    /// Buy, inbound transfer or sell with zero quantity; skipped.
    #[serde(rename_all = "camelCase")]
    ZeroQuantity { transaction_id: String },
}

impl Warning {
    /// Short identifier used by the validate command
    pub fn code(&self) -> &'static str {
        match self {
            Warning::InsufficientLots { available, .. } if available.is_zero() => "NoCostBasis",
            Warning::InsufficientLots { .. } => "InsufficientLots",
            Warning::FallbackRate { .. } => "FallbackRate",
            Warning::OutflowNotModelled { .. } => "OutflowNotModelled",
            Warning::ZeroQuantity { .. } => "ZeroQuantity",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::InsufficientLots {
                transaction_id,
                venue,
                asset,
                available,
                required,
            } if available.is_zero() => write!(
                f,
                "{transaction_id}: no open {asset} lots on {venue} - {required} disposed with zero cost basis"
            ),
            Warning::InsufficientLots {
                transaction_id,
                venue,
                asset,
                available,
                required,
            } => write!(
                f,
                "{transaction_id}: only {available} {asset} open on {venue} (required {required}) - remainder has zero cost basis"
            ),
            Warning::FallbackRate { from, to } => {
                write!(f, "no FX rate {from}->{to}, converted at 1:1")
            }
            Warning::OutflowNotModelled {
                transaction_id,
                kind,
            } => write!(
                f,
                "{transaction_id}: {kind} is not treated as a disposal, lots left untouched"
            ),
            Warning::ZeroQuantity { transaction_id } => {
                write!(f, "{transaction_id}: zero quantity, skipped")
            }
        }
    }
}
