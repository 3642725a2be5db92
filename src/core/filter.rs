use super::reference::within_window;
use super::transaction::VenueTransaction;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Date range and venue allow-list applied to the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(default)]
    pub start_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub end_date: Option<DateTime<FixedOffset>>,
    /// Empty means every venue
    #[serde(default)]
    pub venues: Vec<String>,
}

impl TransactionFilter {
    pub fn allows_venue(&self, venue: &str) -> bool {
        self.venues.is_empty() || self.venues.iter().any(|v| v.eq_ignore_ascii_case(venue))
    }

    pub fn allows_time(&self, at: DateTime<FixedOffset>) -> bool {
        within_window(at, self.start_date, self.end_date)
    }

    /// Matching transactions in chronological order; ties keep ledger order.
    pub fn apply<'a>(&self, transactions: &'a [VenueTransaction]) -> Vec<&'a VenueTransaction> {
        let mut selected: Vec<&VenueTransaction> = transactions
            .iter()
            .filter(|tx| self.allows_venue(&tx.venue) && self.allows_time(tx.venue_timestamp))
            .collect();
        // sort_by_key is stable
        selected.sort_by_key(|tx| tx.venue_timestamp);
        log::debug!(
            "Filter kept {} of {} transactions",
            selected.len(),
            transactions.len()
        );
        selected
    }
}
