use super::reference::FxRate;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What to do when no FX observation exists for a currency pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RatePolicy {
    /// Convert at 1:1 and record a warning
    #[default]
    Fallback,
    /// Fail the computation with `MissingRateError`
    Strict,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("no FX rate from {from} to {to} (needed at {at})")]
pub struct MissingRateError {
    pub from: String,
    pub to: String,
    pub at: DateTime<FixedOffset>,
}

/// Where the rate of a conversion came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// Same currency on both sides
    Identity,
    Observed,
    /// No observation; 1:1 used under `RatePolicy::Fallback`
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub value: Decimal,
    pub source: RateSource,
}

/// Converts amounts between currencies using a flat list of FX observations.
///
/// Lookup takes the first observation in ledger order for the pair, not the
/// one closest to the conversion time. Callers that need point-in-time rates
/// should narrow the observation list before building the converter.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyConverter<'a> {
    rates: &'a [FxRate],
    policy: RatePolicy,
}

impl<'a> CurrencyConverter<'a> {
    pub fn new(rates: &'a [FxRate], policy: RatePolicy) -> Self {
        CurrencyConverter { rates, policy }
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }

    pub fn lookup(&self, from: &str, to: &str) -> Option<&'a FxRate> {
        self.rates.iter().find(|r| {
            r.base_currency.eq_ignore_ascii_case(from) && r.quote_currency.eq_ignore_ascii_case(to)
        })
    }

    pub fn convert(
        &self,
        value: Decimal,
        from: &str,
        to: &str,
        at: DateTime<FixedOffset>,
    ) -> Result<Decimal, MissingRateError> {
        self.convert_detailed(value, from, to, at).map(|c| c.value)
    }

    pub fn convert_detailed(
        &self,
        value: Decimal,
        from: &str,
        to: &str,
        at: DateTime<FixedOffset>,
    ) -> Result<Conversion, MissingRateError> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(Conversion {
                value,
                source: RateSource::Identity,
            });
        }

        if let Some(rate) = self.lookup(from, to) {
            return Ok(Conversion {
                value: value * rate.rate,
                source: RateSource::Observed,
            });
        }

        match self.policy {
            RatePolicy::Fallback => {
                log::warn!("No FX rate {}->{} at {}, using 1:1", from, to, at);
                Ok(Conversion {
                    value,
                    source: RateSource::Fallback,
                })
            }
            RatePolicy::Strict => Err(MissingRateError {
                from: from.to_string(),
                to: to.to_string(),
                at,
            }),
        }
    }
}
