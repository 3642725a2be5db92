//! E2E tests for the taxlot commands

use std::process::{Command, Output};

fn taxlot(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Report tables list gains, income and open lots
#[test]
fn report_tables() {
    let output = taxlot(&["report", "-l", "tests/data/ledger.json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("TAX REPORT (FIFO, USD)"));
    assert!(stdout.contains("13403.22"));
    assert!(stdout.contains("REALIZED GAINS"));
    assert!(stdout.contains("OPEN LOTS"));
    assert!(stdout.contains("staking_reward"));
    assert!(stdout.contains("Kraken"));
    assert!(stdout.contains("Binance"));
}

/// JSON output carries the full result
#[test]
fn report_json() {
    let output = taxlot(&[
        "report",
        "-l",
        "tests/data/ledger.json",
        "--method",
        "lifo",
        "--json",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["metadata"]["costBasis"], "LIFO");
    assert_eq!(json["transactionsEvaluated"], 11);
    assert_eq!(json["realizedGains"].as_array().unwrap().len(), 4);
    assert_eq!(json["warnings"][0]["type"], "outflow_not_modelled");
}

/// Venue and date filters narrow the evaluated transactions
#[test]
fn report_filters() {
    let output = taxlot(&[
        "report",
        "-l",
        "tests/data/ledger.json",
        "--venue",
        "Kraken",
        "--start",
        "2024-01-01",
        "--end",
        "2024-12-31",
        "--jurisdiction",
        "CH",
        "--json",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["transactionsEvaluated"], 5);
    assert_eq!(json["metadata"]["jurisdiction"], "CH");
    for gain in json["realizedGains"].as_array().unwrap() {
        assert_eq!(gain["venue"], "Kraken");
    }
}

/// Malformed dates are rejected before any computation
#[test]
fn report_rejects_bad_dates() {
    let output = taxlot(&[
        "report",
        "-l",
        "tests/data/ledger.json",
        "--start",
        "2025-01-01",
        "--end",
        "2024-01-01",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("is after end date"));
}

/// Strict FX fails on the EUR balance that has no rate
#[test]
fn report_strict_rates() {
    let output = taxlot(&["report", "-l", "tests/data/ledger.json", "--strict-rates"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("no FX rate from EUR to USD"));
}

/// CSV export goes to stdout with every table header
#[test]
fn export_csv() {
    let output = taxlot(&["export", "-l", "tests/data/ledger.json", "--format", "csv"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("realized_gains_total,13403.22"));
    assert!(stdout.contains("income_total,128.48"));
    assert!(stdout.contains("timestamp,venue,asset,quantity,proceeds,cost_basis,gain_loss"));
    assert!(stdout.contains("timestamp,venue,type,asset,amount,value_in_base"));
    assert!(stdout.contains("acquired_at,venue,asset,original_quantity,remaining_quantity,acquisition_value"));
    assert!(stdout.contains("Kraken,SOL,120,3115.32,2403.60,711.72"));
}

/// Statement export writes a standalone HTML file
#[test]
fn export_statement() {
    let path = std::env::temp_dir().join(format!("taxlot-statement-{}.html", std::process::id()));
    let path_str = path.to_string_lossy().to_string();
    let output = taxlot(&[
        "export",
        "-l",
        "tests/data/ledger.json",
        "--format",
        "statement",
        "-o",
        &path_str,
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let html = std::fs::read_to_string(&path).expect("statement written");
    let _ = std::fs::remove_file(&path);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Tax Lot Statement"));
    assert!(html.contains("13403.22 USD"));
    assert!(html.contains("Largest holdings"));
}

/// Validate exits with 1 when warnings exist
#[test]
fn validate_reports_warnings() {
    let output = taxlot(&["validate", "-l", "tests/data/ledger.json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("2 issue(s) found"));
    assert!(stdout.contains("[OutflowNotModelled]"));
    assert!(stdout.contains("[FallbackRate]"));
}

#[test]
fn validate_json() {
    let output = taxlot(&["validate", "-l", "tests/data/ledger.json", "--json"]);
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["issueCount"], 2);
    assert_eq!(json["issues"][1]["code"], "FallbackRate");
    assert_eq!(json["issues"][1]["detail"]["from"], "EUR");
}

#[test]
fn validate_clean_ledger() {
    let output = taxlot(&["validate", "-l", "tests/data/clean.json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("No issues found"));
}

/// Schema command prints the ledger JSON schema and CSV headers
#[test]
fn schema_outputs() {
    let output = taxlot(&["schema"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["title"], "Ledger");
    assert!(json["definitions"]["VenueTransaction"].is_object());

    let output = taxlot(&["schema", "csv-header"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_eq!(stdout.lines().count(), 3);
    assert!(stdout.starts_with("timestamp,venue,asset,quantity"));
}

/// Watch runs the scheduler a bounded number of times
#[test]
fn watch_single_run() {
    let output = taxlot(&[
        "watch",
        "-l",
        "tests/data/clean.json",
        "--interval-secs",
        "1",
        "--runs",
        "1",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["status"], "idle");
    assert_eq!(json["intervalMs"], 1000);
    let realized: f64 = json["lastSummary"]["realizedGains"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("decimal string");
    assert_eq!(realized, 3000.0);
    assert_eq!(json["runHistory"].as_array().unwrap().len(), 1);
}

/// Intervals beyond a week are refused by argument parsing
#[test]
fn watch_rejects_oversized_interval() {
    let output = taxlot(&[
        "watch",
        "-l",
        "tests/data/ledger.json",
        "--interval-secs",
        "99999999999999999",
        "--runs",
        "2",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr.contains("--interval-secs"));
    assert!(!stderr.contains("panicked"));
}

/// A missing ledger shows up in the run history instead of vanishing
#[test]
fn watch_records_ledger_load_failure() {
    let output = taxlot(&[
        "watch",
        "-l",
        "tests/data/does-not-exist.json",
        "--interval-secs",
        "1",
        "--runs",
        "1",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert!(json["lastSummary"].is_null());
    assert!(json["nextRunAt"].is_string());
    let history = json["runHistory"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["outcome"]["status"], "failed");
    assert!(history[0]["outcome"]["error"]
        .as_str()
        .unwrap()
        .contains("failed to load ledger"));
}
