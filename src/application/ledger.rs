use super::merger::RecordSet;
use super::stats::{AggregateStats, StatsSnapshot};
use crate::domain::models::StoredRecords;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// The working record set of one wallet, owned by whoever drives ingestion.
#[derive(Clone, Debug, PartialEq)]
pub struct WalletLedger {
    pub address: String,
    pub records: RecordSet,
    pub last_fetch_timestamp: Option<DateTime<Utc>>,
}

impl WalletLedger {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            records: RecordSet::default(),
            last_fetch_timestamp: None,
        }
    }

    pub fn from_stored(address: impl Into<String>, stored: Option<StoredRecords>) -> Self {
        let mut ledger = Self::new(address);
        if let Some(stored) = stored {
            ledger.records = RecordSet::from_records(stored.records);
            ledger.last_fetch_timestamp = stored.last_fetch_timestamp;
        }
        ledger
    }

    pub fn to_stored(&self) -> StoredRecords {
        StoredRecords {
            records: self.records.records().to_vec(),
            last_fetch_timestamp: self.last_fetch_timestamp,
        }
    }

    /// Nothing was ever fetched for this wallet.
    pub fn is_pristine(&self) -> bool {
        self.records.is_empty() && self.last_fetch_timestamp.is_none()
    }

    /// True when the last fetch is missing or older than `window`.
    pub fn is_stale(&self, window: Duration, now: DateTime<Utc>) -> bool {
        match self.last_fetch_timestamp {
            None => true,
            Some(at) => now
                .signed_duration_since(at)
                .to_std()
                .map_or(false, |age| age >= window),
        }
    }

    pub fn snapshot(&self, limit: usize, window: Duration) -> StatsSnapshot {
        StatsSnapshot {
            stats: AggregateStats::from_records(self.records.records()),
            recent: self.records.recent(limit).to_vec(),
            last_fetch_timestamp: self.last_fetch_timestamp,
            stale: self.is_stale(window, Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Direction, TransactionRecord};

    #[test]
    fn staleness_follows_window() {
        let now = Utc::now();
        let mut ledger = WalletLedger::new("wallet");
        assert!(ledger.is_stale(Duration::from_secs(60), now));

        ledger.last_fetch_timestamp = Some(now - chrono::Duration::seconds(30));
        assert!(!ledger.is_stale(Duration::from_secs(60), now));
        assert!(ledger.is_stale(Duration::from_secs(10), now));
    }

    #[test]
    fn stored_round_trip_dedupes() {
        let record = TransactionRecord::new("a", Some(1), 1, Direction::Received, 9, None);
        let stored = StoredRecords {
            records: vec![record.clone(), record],
            last_fetch_timestamp: None,
        };

        let ledger = WalletLedger::from_stored("wallet", Some(stored));
        assert_eq!(ledger.records.len(), 1);
        assert!(!ledger.is_pristine());
        assert_eq!(ledger.to_stored().records.len(), 1);
    }
}
