//! Engine tests against the library, using the ledger fixture

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::BufReader;
use taxlot::core::{
    compute, compute_at, read_ledger_json, CostBasisMethod, EngineError, EngineRequest, Ledger,
    RatePolicy, RequestParams, ShortfallPolicy, TaxComputationResult, ValidationError, Warning,
};

fn fixture() -> Ledger {
    let file = File::open("tests/data/ledger.json").expect("fixture");
    read_ledger_json(BufReader::new(file)).expect("valid ledger")
}

fn request(params: RequestParams) -> EngineRequest {
    EngineRequest::parse(params).expect("valid request")
}

fn method(name: &str) -> EngineRequest {
    request(RequestParams {
        cost_basis: Some(name.to_string()),
        ..RequestParams::default()
    })
}

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn gain<'a>(result: &'a TaxComputationResult, tx: &str) -> &'a taxlot::core::RealizedGainRecord {
    result
        .realized_gains
        .iter()
        .find(|g| g.source_transaction_id == tx)
        .unwrap_or_else(|| panic!("no gain for {tx}"))
}

#[test]
fn fifo_totals_over_fixture() {
    let result = compute(&fixture(), &EngineRequest::default()).unwrap();

    assert_eq!(result.transactions_evaluated, 11);
    assert_eq!(result.realized_gains.len(), 4);
    assert_eq!(result.total_realized(), dec!(13403.22));
    assert_eq!(result.total_income(), dec!(128.484));
    assert_eq!(result.metadata.cost_basis, CostBasisMethod::Fifo);
    assert_eq!(result.metadata.base_currency, "USD");

    // chronological regardless of ledger order
    let order: Vec<&str> = result
        .realized_gains
        .iter()
        .map(|g| g.source_transaction_id.as_str())
        .collect();
    assert_eq!(order, vec!["k-sell-dot", "b-sell-btc", "k-sell-sol", "k-sell-eth"]);
}

#[test]
fn sol_sale_uses_fee_inclusive_cost() {
    let result = compute(&fixture(), &EngineRequest::default()).unwrap();
    let sol = gain(&result, "k-sell-sol");

    assert_eq!(sol.quantity, dec!(120));
    assert_eq!(sol.cost_basis, dec!(120) * (dec!(5007.5) / dec!(250)));
    assert_eq!(sol.proceeds, dec!(3115.32));
    assert_eq!(sol.gain_loss, sol.proceeds - sol.cost_basis);

    let lot = result.lots.iter().find(|l| l.id == "lot-k-buy-sol").unwrap();
    // the transfer out does not touch lots
    assert_eq!(lot.remaining_quantity, dec!(130));
}

#[test]
fn fifo_and_lifo_consume_btc_lots_in_opposite_order() {
    let ledger = fixture();

    let fifo = compute(&ledger, &method("FIFO")).unwrap();
    let btc = gain(&fifo, "b-sell-btc");
    let consumed: Vec<(&str, Decimal)> = btc
        .breakdown
        .iter()
        .map(|c| (c.lot_id.as_str(), c.quantity_consumed))
        .collect();
    assert_eq!(
        consumed,
        vec![("lot-b-buy-btc-1", dec!(0.5)), ("lot-b-buy-btc-2", dec!(0.1))]
    );
    assert_eq!(btc.cost_basis, dec!(25000));

    let lifo = compute(&ledger, &method("lifo")).unwrap();
    let btc = gain(&lifo, "b-sell-btc");
    let consumed: Vec<(&str, Decimal)> = btc
        .breakdown
        .iter()
        .map(|c| (c.lot_id.as_str(), c.quantity_consumed))
        .collect();
    assert_eq!(
        consumed,
        vec![("lot-b-buy-btc-2", dec!(0.3)), ("lot-b-buy-btc-1", dec!(0.3))]
    );
    assert_eq!(btc.cost_basis, dec!(27000));
    assert_eq!(lifo.total_realized(), dec!(11403.22));
}

#[test]
fn hifo_takes_most_expensive_lot_first() {
    let result = compute(&fixture(), &method("HIFO")).unwrap();
    let btc = gain(&result, "b-sell-btc");
    assert_eq!(btc.breakdown[0].lot_id, "lot-b-buy-btc-2");
    assert_eq!(btc.gain_loss, dec!(9000));
}

#[test]
fn staking_reward_sold_at_receipt_value_has_no_gain() {
    let result = compute(
        &fixture(),
        &request(RequestParams {
            base_currency: Some("CHF".to_string()),
            ..RequestParams::default()
        }),
    )
    .unwrap();

    let income = result
        .income
        .iter()
        .find(|i| i.source_transaction_id == "k-stake-dot")
        .unwrap();
    assert_eq!(income.value, dec!(105.44));
    assert_eq!(income.currency, "CHF");

    let dot = gain(&result, "k-sell-dot");
    assert_eq!(dot.gain_loss, Decimal::ZERO);
    assert_eq!(dot.unmatched_quantity, Decimal::ZERO);
}

#[test]
fn disposals_never_reach_into_other_venues() {
    let ledger: Ledger = serde_json::from_value(serde_json::json!({
        "transactions": [
            { "id": "a-buy", "venue": "VenueA", "type": "trade", "side": "buy",
              "baseAsset": "BTC", "quoteAsset": "USD", "quantity": 0.4,
              "grossValue": 16000, "venueTimestamp": "2024-01-01" },
            { "id": "b-buy", "venue": "VenueB", "type": "trade", "side": "buy",
              "baseAsset": "BTC", "quoteAsset": "USD", "quantity": 0.5,
              "grossValue": 20000, "venueTimestamp": "2024-01-02" },
            { "id": "a-sell", "venue": "VenueA", "type": "trade", "side": "sell",
              "baseAsset": "BTC", "quoteAsset": "USD", "quantity": 0.6,
              "grossValue": 30000, "venueTimestamp": "2024-02-01" }
        ]
    }))
    .unwrap();

    let result = compute(&ledger, &EngineRequest::default()).unwrap();
    let sale = gain(&result, "a-sell");
    assert_eq!(sale.matched_quantity(), dec!(0.4));
    assert_eq!(sale.unmatched_quantity, dec!(0.2));
    assert_eq!(sale.cost_basis, dec!(16000));
    assert_eq!(sale.gain_loss, dec!(14000));

    let venue_b = result.lots.iter().find(|l| l.venue == "VenueB").unwrap();
    assert_eq!(venue_b.remaining_quantity, dec!(0.5));
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        Warning::InsufficientLots { transaction_id, .. } if transaction_id == "a-sell"
    )));

    let rejecting = EngineRequest {
        shortfall_policy: ShortfallPolicy::Reject,
        ..EngineRequest::default()
    };
    assert_eq!(
        compute(&ledger, &rejecting).unwrap_err(),
        EngineError::InsufficientLots {
            transaction_id: "a-sell".to_string(),
            required: dec!(0.6),
            available: dec!(0.4),
        }
    );
}

#[test]
fn venue_and_window_filters_limit_evaluation() {
    let result = compute(
        &fixture(),
        &request(RequestParams {
            venues: vec!["Kraken".to_string()],
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-12-31".to_string()),
            ..RequestParams::default()
        }),
    )
    .unwrap();

    assert_eq!(result.transactions_evaluated, 5);
    assert!(result.lots.iter().all(|l| l.venue == "Kraken"));
    assert!(result.realized_gains.iter().all(|g| g.venue == "Kraken"));
    assert!(result.income.iter().all(|i| i.venue == "Kraken"));
    assert!(result.holdings.iter().all(|h| h.venue == "Kraken"));
    assert_eq!(result.holdings.len(), 2);
    assert_eq!(result.total_realized(), dec!(711.72));
    // market price captured in 2025 falls outside the window
    assert_eq!(result.market_prices.len(), 1);
}

#[test]
fn repeated_runs_are_identical() {
    let ledger = fixture();
    let request = method("HIFO");

    let first = compute_at(&ledger, &request, at("2025-01-01T00:00:00Z")).unwrap();
    let second = compute_at(&ledger, &request, at("2025-06-01T00:00:00Z")).unwrap();

    assert_ne!(first.metadata.generated_at, second.metadata.generated_at);
    assert_eq!(first.lots, second.lots);
    assert_eq!(first.realized_gains, second.realized_gains);
    assert_eq!(first.income, second.income);
    assert_eq!(first.holdings, second.holdings);
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
}

#[test]
fn concurrent_runs_do_not_interfere() {
    let ledger = &fixture();
    let requests = [method("FIFO"), method("LIFO"), method("HIFO")];
    let sequential: Vec<String> = requests
        .iter()
        .map(|r| compute(ledger, r).unwrap().fingerprint().unwrap())
        .collect();

    let concurrent: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = requests
            .iter()
            .map(|r| s.spawn(move || compute(ledger, r).unwrap().fingerprint().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, concurrent);
    assert_ne!(sequential[0], sequential[1]);
}

#[test]
fn lot_quantities_are_conserved() {
    let result = compute(&fixture(), &method("LIFO")).unwrap();
    for lot in &result.lots {
        let consumed: Decimal = result
            .realized_gains
            .iter()
            .flat_map(|g| &g.breakdown)
            .filter(|c| c.lot_id == lot.id)
            .map(|c| c.quantity_consumed)
            .sum();
        assert_eq!(lot.remaining_quantity + consumed, lot.quantity, "{}", lot.id);
        assert!(lot.remaining_quantity >= Decimal::ZERO);
    }
}

#[test]
fn warnings_describe_fixture_gaps() {
    let result = compute(&fixture(), &EngineRequest::default()).unwrap();
    let codes: Vec<&str> = result.warnings.iter().map(|w| w.code()).collect();
    assert_eq!(codes, vec!["OutflowNotModelled", "FallbackRate"]);
    assert_eq!(
        result.warnings[1],
        Warning::FallbackRate {
            from: "EUR".to_string(),
            to: "USD".to_string()
        }
    );
    // EUR balance is carried at face value
    let usdt = result.holdings.iter().find(|h| h.asset == "USDT").unwrap();
    assert_eq!(usdt.value, dec!(460));
    assert_eq!(result.holdings_value(), dec!(22340));
}

#[test]
fn strict_rates_fail_on_missing_pair() {
    let strict = EngineRequest {
        rate_policy: RatePolicy::Strict,
        ..EngineRequest::default()
    };
    match compute(&fixture(), &strict) {
        Err(EngineError::MissingRate(err)) => {
            assert_eq!(err.from, "EUR");
            assert_eq!(err.to, "USD");
        }
        other => panic!("expected missing rate, got {other:?}"),
    }
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut ledger = fixture();
    let copy = ledger.transactions[0].clone();
    ledger.transactions.push(copy);
    assert_eq!(
        compute(&ledger, &EngineRequest::default()).unwrap_err(),
        EngineError::Validation(ValidationError::DuplicateTransactionId(
            "k-buy-sol".to_string()
        ))
    );
}
