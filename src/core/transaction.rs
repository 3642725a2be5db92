use super::reference::{BalanceSnapshot, FxRate, MarketPrice};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid {field} datetime: {value}")]
    InvalidDate { field: &'static str, value: String },
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: String, end: String },
    #[error("unknown cost basis method: {0}")]
    UnknownCostBasis(String),
    #[error("base currency must not be empty")]
    EmptyBaseCurrency,
    #[error("duplicate transaction id: {0}")]
    DuplicateTransactionId(String),
    #[error("trade requires a side (buy or sell): {id}")]
    MissingSide { id: String },
    #[error("{field} must not be negative: {id}")]
    Negative { id: String, field: &'static str },
}

/// Input root for ledger JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub transactions: Vec<VenueTransaction>,
    /// Point-in-time balances reported by each venue
    #[serde(default)]
    pub balances: Vec<BalanceSnapshot>,
    #[serde(default)]
    pub fx_rates: Vec<FxRate>,
    #[serde(default)]
    pub market_prices: Vec<MarketPrice>,
}

/// Kind of economic event recorded by a venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Trade,
    TransferIn,
    TransferOut,
    StakingReward,
    Interest,
    Fee,
    Airdrop,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Trade => "trade",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::StakingReward => "staking_reward",
            TransactionKind::Interest => "interest",
            TransactionKind::Fee => "fee",
            TransactionKind::Airdrop => "airdrop",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// One economic event at one venue. Read-only for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VenueTransaction {
    /// Unique identifier for this transaction
    pub id: String,
    /// Venue where the event happened (e.g., "Kraken", "Binance")
    pub venue: String,
    /// Account identifier at the venue
    #[serde(default)]
    pub account: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Required for trades
    #[serde(default)]
    pub side: Option<Side>,
    /// Asset moved by the event (e.g., "BTC")
    pub base_asset: String,
    /// Currency the event is valued in (e.g., "USD")
    pub quote_asset: String,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub price: Option<Decimal>,
    /// Quote-currency notional before fees
    #[serde(default)]
    #[schemars(with = "f64")]
    pub gross_value: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub fee_amount: Decimal,
    #[serde(default)]
    pub fee_asset: Option<String>,
    /// Fee-adjusted value actually received or paid; defaults to gross value
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub net_value: Option<Decimal>,
    /// Authoritative event time (RFC3339 with offset; date-only assumes UTC)
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub venue_timestamp: DateTime<FixedOffset>,
}

impl VenueTransaction {
    /// Value the holder actually received or paid, in the quote currency.
    pub fn settled_value(&self) -> Decimal {
        self.net_value.unwrap_or(self.gross_value)
    }

    /// Unit price, derived from `value / quantity` when the venue did not report one.
    pub fn unit_price_or(&self, value: Decimal) -> Decimal {
        match self.price {
            Some(price) => price,
            None if self.quantity.is_zero() => Decimal::ZERO,
            None => value / self.quantity,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.kind == TransactionKind::Trade && self.side == Some(Side::Buy)
    }

    pub fn is_sell(&self) -> bool {
        self.kind == TransactionKind::Trade && self.side == Some(Side::Sell)
    }
}

/// Read a ledger from JSON, normalizing asset symbols. Ledger order is preserved.
pub fn read_ledger_json<R: Read>(reader: R) -> anyhow::Result<Ledger> {
    let mut ledger: Ledger = serde_json::from_reader(reader)?;
    normalize_ledger(&mut ledger);
    Ok(ledger)
}

/// Boundary checks run before any lot processing.
pub fn validate_transactions(transactions: &[VenueTransaction]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();

    for tx in transactions {
        if !seen.insert(tx.id.as_str()) {
            return Err(ValidationError::DuplicateTransactionId(tx.id.clone()));
        }
        if tx.kind == TransactionKind::Trade && tx.side.is_none() {
            return Err(ValidationError::MissingSide { id: tx.id.clone() });
        }

        let negative = |field: &'static str| ValidationError::Negative {
            id: tx.id.clone(),
            field,
        };
        if tx.quantity < Decimal::ZERO {
            return Err(negative("quantity"));
        }
        if tx.price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(negative("price"));
        }
        if tx.gross_value < Decimal::ZERO {
            return Err(negative("grossValue"));
        }
        if tx.net_value.is_some_and(|v| v < Decimal::ZERO) {
            return Err(negative("netValue"));
        }
        if tx.fee_amount < Decimal::ZERO {
            return Err(negative("feeAmount"));
        }
    }

    Ok(())
}

fn normalize_ledger(ledger: &mut Ledger) {
    for tx in &mut ledger.transactions {
        tx.base_asset = normalize_currency(&tx.base_asset);
        tx.quote_asset = normalize_currency(&tx.quote_asset);
        if let Some(fee_asset) = tx.fee_asset.as_mut() {
            *fee_asset = normalize_currency(fee_asset);
        }
    }
    for balance in &mut ledger.balances {
        balance.asset = normalize_currency(&balance.asset);
        balance.currency = normalize_currency(&balance.currency);
    }
    for rate in &mut ledger.fx_rates {
        rate.base_currency = normalize_currency(&rate.base_currency);
        rate.quote_currency = normalize_currency(&rate.quote_currency);
    }
    for price in &mut ledger.market_prices {
        price.asset = normalize_currency(&price.asset);
        price.quote_currency = normalize_currency(&price.quote_currency);
    }
}

pub fn normalize_currency(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Parse a timestamp. Naive timestamps and bare dates are read as UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().fixed_offset());
        }
    }
    parse_date(s).map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset())
}

/// Bare `YYYY-MM-DD` date, if that is all the string holds.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

pub(super) fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_datetime(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(id: &str, side: Option<Side>, quantity: Decimal) -> VenueTransaction {
        VenueTransaction {
            id: id.to_string(),
            venue: "Kraken".to_string(),
            account: "main".to_string(),
            kind: TransactionKind::Trade,
            side,
            base_asset: "SOL".to_string(),
            quote_asset: "USD".to_string(),
            quantity,
            price: Some(dec!(20)),
            gross_value: dec!(5000),
            fee_amount: dec!(7.5),
            fee_asset: Some("USD".to_string()),
            net_value: Some(dec!(5007.5)),
            venue_timestamp: parse_datetime("2024-03-01T10:00:00Z").unwrap(),
        }
    }

    #[test]
    fn reads_camel_case_ledger() {
        let json = r#"{
            "transactions": [{
                "id": "t1",
                "venue": "Kraken",
                "account": "acc-1",
                "type": "staking_reward",
                "baseAsset": " dot ",
                "quoteAsset": "chf",
                "quantity": "16",
                "grossValue": "105.44",
                "netValue": "105.44",
                "venueTimestamp": "2024-05-01"
            }],
            "fxRates": [{
                "baseCurrency": "usd",
                "quoteCurrency": "chf",
                "rate": "0.9",
                "capturedAt": "2024-05-01T00:00:00Z"
            }]
        }"#;

        let ledger = read_ledger_json(json.as_bytes()).unwrap();
        let tx = &ledger.transactions[0];
        assert_eq!(tx.kind, TransactionKind::StakingReward);
        assert_eq!(tx.base_asset, "DOT");
        assert_eq!(tx.quote_asset, "CHF");
        assert_eq!(tx.quantity, dec!(16));
        assert_eq!(tx.side, None);
        assert_eq!(tx.venue_timestamp, parse_datetime("2024-05-01T00:00:00Z").unwrap());
        assert_eq!(ledger.fx_rates[0].base_currency, "USD");
        assert!(ledger.balances.is_empty());
    }

    #[test]
    fn rejects_unparsable_timestamp() {
        let json = r#"{"transactions": [{
            "id": "t1", "venue": "Kraken", "type": "fee",
            "baseAsset": "BTC", "quoteAsset": "USD", "quantity": "0",
            "venueTimestamp": "yesterday"
        }]}"#;

        let err = read_ledger_json(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("invalid datetime"));
    }

    #[test]
    fn parses_supported_datetime_formats() {
        let expected = parse_datetime("2024-01-15T10:30:00+00:00").unwrap();
        assert_eq!(parse_datetime("2024-01-15T10:30:00").unwrap(), expected);
        assert_eq!(parse_datetime("2024-01-15 10:30:00").unwrap(), expected);
        assert_eq!(
            parse_datetime("2024-01-15").unwrap(),
            parse_datetime("2024-01-15T00:00:00Z").unwrap()
        );
        assert!(parse_datetime("15/01/2024").is_none());
    }

    #[test]
    fn settled_value_prefers_net_value() {
        let mut tx = trade("t1", Some(Side::Buy), dec!(250));
        assert_eq!(tx.settled_value(), dec!(5007.5));
        tx.net_value = None;
        assert_eq!(tx.settled_value(), dec!(5000));
    }

    #[test]
    fn unit_price_falls_back_to_value_over_quantity() {
        let mut tx = trade("t1", Some(Side::Buy), dec!(250));
        assert_eq!(tx.unit_price_or(dec!(1000)), dec!(20));
        tx.price = None;
        assert_eq!(tx.unit_price_or(dec!(1000)), dec!(4));
        tx.quantity = Decimal::ZERO;
        assert_eq!(tx.unit_price_or(dec!(1000)), Decimal::ZERO);
    }

    #[test]
    fn validation_rejects_duplicate_ids() {
        let txs = vec![
            trade("t1", Some(Side::Buy), dec!(1)),
            trade("t1", Some(Side::Sell), dec!(1)),
        ];
        assert_eq!(
            validate_transactions(&txs),
            Err(ValidationError::DuplicateTransactionId("t1".to_string()))
        );
    }

    #[test]
    fn validation_rejects_trade_without_side() {
        let txs = vec![trade("t1", None, dec!(1))];
        assert_eq!(
            validate_transactions(&txs),
            Err(ValidationError::MissingSide {
                id: "t1".to_string()
            })
        );
    }

    #[test]
    fn validation_rejects_negative_quantity() {
        let txs = vec![trade("t1", Some(Side::Buy), dec!(-1))];
        assert_eq!(
            validate_transactions(&txs),
            Err(ValidationError::Negative {
                id: "t1".to_string(),
                field: "quantity"
            })
        );
    }

    #[test]
    fn validation_rejects_negative_net_value() {
        let mut tx = trade("t1", Some(Side::Sell), dec!(1));
        tx.net_value = Some(dec!(-10));
        assert_eq!(
            validate_transactions(&[tx]),
            Err(ValidationError::Negative {
                id: "t1".to_string(),
                field: "netValue"
            })
        );
    }

    #[test]
    fn validation_accepts_zero_quantity() {
        let txs = vec![trade("t1", Some(Side::Buy), Decimal::ZERO)];
        assert_eq!(validate_transactions(&txs), Ok(()));
    }
}
