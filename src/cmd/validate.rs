//! Validate command - surface data quality issues without printing the full report

use super::EngineArgs;
use clap::Args;
use serde::Serialize;
use taxlot::core::Warning;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    engine: EngineArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// JSON output structure
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationOutput<'a> {
    transactions_evaluated: usize,
    issue_count: usize,
    issues: Vec<ValidationIssue<'a>>,
}

#[derive(Debug, Serialize)]
struct ValidationIssue<'a> {
    code: &'static str,
    message: String,
    detail: &'a Warning,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let result = self.engine.compute()?;
        let issues: Vec<ValidationIssue> = result
            .warnings
            .iter()
            .map(|w| ValidationIssue {
                code: w.code(),
                message: w.to_string(),
                detail: w,
            })
            .collect();

        if self.json {
            let output = ValidationOutput {
                transactions_evaluated: result.transactions_evaluated,
                issue_count: issues.len(),
                issues,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            if output.issue_count > 0 {
                std::process::exit(1);
            }
        } else {
            print_text(&issues, result.transactions_evaluated);
            if !issues.is_empty() {
                std::process::exit(1);
            }
        }
        Ok(())
    }
}

fn print_text(issues: &[ValidationIssue], transactions_evaluated: usize) {
    println!();
    println!("VALIDATION RESULTS ({} transactions)", transactions_evaluated);
    println!();

    if issues.is_empty() {
        println!("\u{2713} No issues found.");
        return;
    }

    println!("\u{26A0} {} issue(s) found:", issues.len());
    println!();
    for (i, issue) in issues.iter().enumerate() {
        println!("  {}. [{}] {}", i + 1, issue.code, issue.message);
    }
    println!();
}
