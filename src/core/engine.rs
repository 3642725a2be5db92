use super::filter::TransactionFilter;
use super::fx::{CurrencyConverter, MissingRateError, RatePolicy};
use super::lots::{match_lots, CostBasisMethod, MatchError, ShortfallPolicy};
use super::report::{assemble_report, TaxComputationResult};
use super::transaction::{
    normalize_currency, parse_date, parse_datetime, validate_transactions, Ledger, ValidationError,
};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    MissingRate(#[from] MissingRateError),
    #[error("insufficient open lots for {transaction_id}: required {required}, available {available}")]
    InsufficientLots {
        transaction_id: String,
        required: Decimal,
        available: Decimal,
    },
}

impl From<MatchError> for EngineError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::MissingRate(err) => EngineError::MissingRate(err),
            MatchError::InsufficientLots {
                transaction_id,
                required,
                available,
            } => EngineError::InsufficientLots {
                transaction_id,
                required,
                available,
            },
        }
    }
}

/// Invocation parameters as received from a caller, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    /// FIFO, LIFO or HIFO (default FIFO)
    #[serde(default)]
    pub cost_basis: Option<String>,
    #[serde(default)]
    pub base_currency: Option<String>,
    /// ISO-8601 timestamp or date
    #[serde(default)]
    pub start_date: Option<String>,
    /// ISO-8601 timestamp or date; a bare date covers the whole day
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub venues: Vec<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub rate_policy: RatePolicy,
    #[serde(default)]
    pub shortfall_policy: ShortfallPolicy,
}

/// Validated engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRequest {
    pub cost_basis: CostBasisMethod,
    pub base_currency: String,
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
    pub venues: Vec<String>,
    pub jurisdiction: Option<String>,
    pub rate_policy: RatePolicy,
    pub shortfall_policy: ShortfallPolicy,
}

pub const DEFAULT_BASE_CURRENCY: &str = "USD";

impl Default for EngineRequest {
    fn default() -> Self {
        EngineRequest {
            cost_basis: CostBasisMethod::default(),
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            start_date: None,
            end_date: None,
            venues: Vec::new(),
            jurisdiction: None,
            rate_policy: RatePolicy::default(),
            shortfall_policy: ShortfallPolicy::default(),
        }
    }
}

impl EngineRequest {
    pub fn parse(params: RequestParams) -> Result<EngineRequest, ValidationError> {
        let cost_basis = match params.cost_basis.as_deref() {
            Some(method) => method.parse()?,
            None => CostBasisMethod::default(),
        };
        let start_date = params
            .start_date
            .as_deref()
            .map(|s| parse_bound(s, "startDate", false))
            .transpose()?;
        let end_date = params
            .end_date
            .as_deref()
            .map(|s| parse_bound(s, "endDate", true))
            .transpose()?;

        let request = EngineRequest {
            cost_basis,
            base_currency: params
                .base_currency
                .map(|c| normalize_currency(&c))
                .unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string()),
            start_date,
            end_date,
            venues: params
                .venues
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
            jurisdiction: params.jurisdiction,
            rate_policy: params.rate_policy,
            shortfall_policy: params.shortfall_policy,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_currency.trim().is_empty() {
            return Err(ValidationError::EmptyBaseCurrency);
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ValidationError::InvertedRange {
                    start: start.to_rfc3339(),
                    end: end.to_rfc3339(),
                });
            }
        }
        Ok(())
    }

    pub fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            start_date: self.start_date,
            end_date: self.end_date,
            venues: self.venues.clone(),
        }
    }
}

/// Bare dates start at midnight UTC; as an end bound they cover the whole day.
fn parse_bound(
    s: &str,
    field: &'static str,
    end_of_day: bool,
) -> Result<DateTime<FixedOffset>, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        field,
        value: s.to_string(),
    };
    match parse_date(s) {
        Some(date) if end_of_day => {
            let midnight = date.and_time(NaiveTime::MIN).and_utc().fixed_offset();
            Ok(midnight + Duration::days(1) - Duration::nanoseconds(1))
        }
        _ => parse_datetime(s).ok_or_else(invalid),
    }
}

/// Run the engine, stamping the result with the current time.
pub fn compute(ledger: &Ledger, request: &EngineRequest) -> Result<TaxComputationResult, EngineError> {
    compute_at(ledger, request, Utc::now())
}

/// Run the engine with an explicit clock. Each call builds its own lot book,
/// so concurrent calls over the same ledger do not interfere.
pub fn compute_at(
    ledger: &Ledger,
    request: &EngineRequest,
    now: DateTime<Utc>,
) -> Result<TaxComputationResult, EngineError> {
    request.validate()?;
    validate_transactions(&ledger.transactions)?;

    let selected = request.filter().apply(&ledger.transactions);
    let converter = CurrencyConverter::new(&ledger.fx_rates, request.rate_policy);
    let outcome = match_lots(
        &selected,
        request.cost_basis,
        &request.base_currency,
        converter,
        request.shortfall_policy,
    )?;

    let result = assemble_report(outcome, ledger, request, converter, selected.len(), now)?;
    log::info!(
        "Evaluated {} transactions ({}, {}): {} lots, {} disposals, {} income events, {} warnings",
        result.transactions_evaluated,
        request.cost_basis,
        request.base_currency,
        result.lots.len(),
        result.realized_gains.len(),
        result.income.len(),
        result.warnings.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RequestParams {
        RequestParams {
            cost_basis: Some("lifo".to_string()),
            base_currency: Some(" chf ".to_string()),
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-12-31".to_string()),
            venues: vec!["Kraken".to_string(), " ".to_string()],
            ..RequestParams::default()
        }
    }

    #[test]
    fn parses_request_params() {
        let request = EngineRequest::parse(params()).unwrap();
        assert_eq!(request.cost_basis, CostBasisMethod::Lifo);
        assert_eq!(request.base_currency, "CHF");
        assert_eq!(request.venues, vec!["Kraken".to_string()]);
        assert_eq!(
            request.start_date,
            parse_datetime("2024-01-01T00:00:00Z")
        );
        assert_eq!(
            request.end_date,
            parse_datetime("2024-12-31T23:59:59.999999999Z")
        );
    }

    #[test]
    fn defaults_apply_when_params_are_empty() {
        let request = EngineRequest::parse(RequestParams::default()).unwrap();
        assert_eq!(request, EngineRequest::default());
    }

    #[test]
    fn full_timestamp_end_bound_is_kept() {
        let mut p = params();
        p.end_date = Some("2024-06-30T12:00:00+02:00".to_string());
        let request = EngineRequest::parse(p).unwrap();
        assert_eq!(request.end_date, parse_datetime("2024-06-30T10:00:00Z"));
    }

    #[test]
    fn rejects_malformed_dates() {
        let mut p = params();
        p.start_date = Some("01/01/2024".to_string());
        assert_eq!(
            EngineRequest::parse(p).unwrap_err(),
            ValidationError::InvalidDate {
                field: "startDate",
                value: "01/01/2024".to_string()
            }
        );
    }

    #[test]
    fn rejects_unknown_method() {
        let mut p = params();
        p.cost_basis = Some("average".to_string());
        assert_eq!(
            EngineRequest::parse(p).unwrap_err(),
            ValidationError::UnknownCostBasis("average".to_string())
        );
    }

    #[test]
    fn rejects_inverted_range() {
        let mut p = params();
        p.start_date = Some("2025-01-01".to_string());
        assert!(matches!(
            EngineRequest::parse(p).unwrap_err(),
            ValidationError::InvertedRange { .. }
        ));
    }

    #[test]
    fn rejects_empty_base_currency() {
        let mut p = params();
        p.base_currency = Some("  ".to_string());
        assert_eq!(
            EngineRequest::parse(p).unwrap_err(),
            ValidationError::EmptyBaseCurrency
        );
    }

    #[test]
    fn empty_ledger_yields_empty_report() {
        let result = compute(&Ledger::default(), &EngineRequest::default()).unwrap();
        assert!(result.lots.is_empty());
        assert!(result.realized_gains.is_empty());
        assert!(result.income.is_empty());
        assert_eq!(result.transactions_evaluated, 0);
    }
}
