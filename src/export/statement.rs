//! Printable statement
//!
//! A short, self-contained HTML document meant to be printed or saved as PDF
//! from a browser. It lists the most recent disposals and income events and
//! the largest holdings rather than the full result.

use super::display_money;
use crate::core::TaxComputationResult;
use serde::Serialize;
use std::fmt::Write;

pub const MAX_GAINS: usize = 8;
pub const MAX_INCOME: usize = 8;
pub const MAX_HOLDINGS: usize = 10;

const TITLE: &str = "Tax Lot Statement";
const DISCLAIMER: &str = "Informational summary computed from venue records. \
    Not tax advice; verify figures against the rules of your jurisdiction.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementDocument {
    pub title: String,
    pub disclaimer: String,
    /// Label / value pairs shown under the title
    pub metadata: Vec<(String, String)>,
    pub realized_total: String,
    pub income_total: String,
    pub gains: Vec<StatementGain>,
    pub income: Vec<StatementIncome>,
    pub holdings: Vec<StatementHolding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementGain {
    pub date: String,
    pub venue: String,
    pub asset: String,
    pub quantity: String,
    pub proceeds: String,
    pub cost_basis: String,
    pub gain_loss: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementIncome {
    pub date: String,
    pub venue: String,
    pub income_type: String,
    pub asset: String,
    pub quantity: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementHolding {
    pub venue: String,
    pub asset: String,
    pub quantity: String,
    pub value: String,
}

impl StatementDocument {
    pub fn from_result(result: &TaxComputationResult) -> anyhow::Result<Self> {
        let meta = &result.metadata;
        let summary = result.summary();
        let base = &meta.base_currency;

        let period = match (meta.filters.start_date, meta.filters.end_date) {
            (None, None) => "All time".to_string(),
            (start, end) => format!(
                "{} to {}",
                start.map_or("-".to_string(), |d| d.date_naive().to_string()),
                end.map_or("-".to_string(), |d| d.date_naive().to_string())
            ),
        };
        let venues = if meta.filters.venues.is_empty() {
            "All".to_string()
        } else {
            meta.filters.venues.join(", ")
        };

        let mut metadata = vec![
            ("Generated".to_string(), meta.generated_at.format("%Y-%m-%d %H:%M UTC").to_string()),
            ("Cost basis".to_string(), meta.cost_basis.to_string()),
            ("Base currency".to_string(), base.clone()),
        ];
        if let Some(jurisdiction) = &meta.jurisdiction {
            metadata.push(("Jurisdiction".to_string(), jurisdiction.clone()));
        }
        metadata.push(("Period".to_string(), period));
        metadata.push(("Venues".to_string(), venues));
        metadata.push((
            "Transactions evaluated".to_string(),
            result.transactions_evaluated.to_string(),
        ));
        metadata.push(("Fingerprint".to_string(), result.fingerprint()?));

        let mut gains: Vec<_> = result.realized_gains.iter().collect();
        gains.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let gains = gains
            .into_iter()
            .take(MAX_GAINS)
            .map(|g| StatementGain {
                date: g.timestamp.date_naive().to_string(),
                venue: g.venue.clone(),
                asset: g.asset.clone(),
                quantity: g.quantity.normalize().to_string(),
                proceeds: display_money(g.proceeds),
                cost_basis: display_money(g.cost_basis),
                gain_loss: display_money(g.gain_loss),
            })
            .collect();

        let mut income: Vec<_> = result.income.iter().collect();
        income.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let income = income
            .into_iter()
            .take(MAX_INCOME)
            .map(|i| StatementIncome {
                date: i.timestamp.date_naive().to_string(),
                venue: i.venue.clone(),
                income_type: i.income_type.as_str().to_string(),
                asset: i.asset.clone(),
                quantity: i.quantity.normalize().to_string(),
                value: display_money(i.value),
            })
            .collect();

        let mut holdings: Vec<_> = result.holdings.iter().collect();
        holdings.sort_by(|a, b| b.value.cmp(&a.value));
        let holdings = holdings
            .into_iter()
            .take(MAX_HOLDINGS)
            .map(|h| StatementHolding {
                venue: h.venue.clone(),
                asset: h.asset.clone(),
                quantity: h.quantity.normalize().to_string(),
                value: display_money(h.value),
            })
            .collect();

        Ok(StatementDocument {
            title: TITLE.to_string(),
            disclaimer: DISCLAIMER.to_string(),
            metadata,
            realized_total: format!("{} {}", display_money(summary.realized_gains), base),
            income_total: format!("{} {}", display_money(summary.income), base),
            gains,
            income,
            holdings,
        })
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn table(out: &mut String, heading: &str, columns: &[&str], rows: Vec<Vec<&str>>) {
    let _ = writeln!(out, "    <section>\n      <h2>{}</h2>", escape(heading));
    if rows.is_empty() {
        let _ = writeln!(out, "      <p class=\"empty\">None</p>\n    </section>");
        return;
    }
    out.push_str("      <table>\n        <thead><tr>");
    for column in columns {
        let _ = write!(out, "<th>{}</th>", escape(column));
    }
    out.push_str("</tr></thead>\n        <tbody>\n");
    for row in rows {
        out.push_str("          <tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", escape(cell));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("        </tbody>\n      </table>\n    </section>\n");
}

/// Render the statement as standalone HTML
pub fn render_html(doc: &StatementDocument) -> String {
    let mut body = String::new();

    body.push_str("    <dl class=\"metadata\">\n");
    for (label, value) in &doc.metadata {
        let _ = writeln!(body, "      <dt>{}</dt><dd>{}</dd>", escape(label), escape(value));
    }
    body.push_str("    </dl>\n");

    let _ = writeln!(
        body,
        r#"    <section class="summary">
      <div class="card"><h3>Realized gains</h3><p>{}</p></div>
      <div class="card"><h3>Income</h3><p>{}</p></div>
    </section>"#,
        escape(&doc.realized_total),
        escape(&doc.income_total)
    );

    table(
        &mut body,
        "Recent realized gains",
        &["Date", "Venue", "Asset", "Quantity", "Proceeds", "Cost basis", "Gain/Loss"],
        doc.gains
            .iter()
            .map(|g| {
                vec![
                    g.date.as_str(),
                    g.venue.as_str(),
                    g.asset.as_str(),
                    g.quantity.as_str(),
                    g.proceeds.as_str(),
                    g.cost_basis.as_str(),
                    g.gain_loss.as_str(),
                ]
            })
            .collect(),
    );
    table(
        &mut body,
        "Recent income",
        &["Date", "Venue", "Type", "Asset", "Quantity", "Value"],
        doc.income
            .iter()
            .map(|i| {
                vec![
                    i.date.as_str(),
                    i.venue.as_str(),
                    i.income_type.as_str(),
                    i.asset.as_str(),
                    i.quantity.as_str(),
                    i.value.as_str(),
                ]
            })
            .collect(),
    );
    table(
        &mut body,
        "Largest holdings",
        &["Venue", "Asset", "Quantity", "Value"],
        doc.holdings
            .iter()
            .map(|h| vec![h.venue.as_str(), h.asset.as_str(), h.quantity.as_str(), h.value.as_str()])
            .collect(),
    );

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>{title}</title>
  <style>
    body {{ font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; color: #222; margin: 2rem; }}
    h1 {{ margin-bottom: 0.25rem; }}
    .disclaimer {{ background: #fff4e5; border: 1px solid #f0c36d; padding: 0.5rem 1rem; font-size: 0.85rem; }}
    dl.metadata {{ display: grid; grid-template-columns: max-content auto; gap: 0.25rem 1rem; }}
    dl.metadata dt {{ font-weight: 600; }}
    dl.metadata dd {{ margin: 0; font-family: monospace; }}
    .summary {{ display: flex; gap: 1rem; margin: 1rem 0; }}
    .card {{ border: 1px solid #ddd; border-radius: 4px; padding: 0.5rem 1rem; }}
    .card h3 {{ margin: 0; font-size: 0.85rem; color: #666; }}
    .card p {{ margin: 0.25rem 0 0; font-size: 1.25rem; }}
    table {{ border-collapse: collapse; width: 100%; font-size: 0.85rem; }}
    th, td {{ border-bottom: 1px solid #eee; padding: 0.25rem 0.5rem; text-align: left; }}
    p.empty {{ color: #888; }}
    @media print {{ body {{ margin: 0; }} section {{ page-break-inside: avoid; }} }}
  </style>
</head>
<body>
  <header>
    <h1>{title}</h1>
    <p class="disclaimer">{disclaimer}</p>
  </header>
  <main>
{body}  </main>
</body>
</html>
"##,
        title = escape(&doc.title),
        disclaimer = escape(&doc.disclaimer),
        body = body
    )
}
