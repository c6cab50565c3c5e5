use crate::domain::models::{
    lamports_to_native, Direction, TransactionRecord, LAMPORTS_PER_NATIVE,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Count and sum of the records in one direction.
#[derive(Clone, Copy, Serialize, Debug, Default, PartialEq)]
pub struct DirectionTotals {
    pub count: usize,
    /// Sum in native units
    pub total: f64,
    #[serde(skip)]
    pub lamports: u64,
}

impl DirectionTotals {
    fn add(&mut self, lamports: u64) {
        self.count += 1;
        self.lamports += lamports;
        self.total = lamports_to_native(self.lamports);
    }
}

#[derive(Clone, Copy, Serialize, Debug, Default, PartialEq)]
pub struct ByDirection {
    pub sent: DirectionTotals,
    pub received: DirectionTotals,
}

/// Statistics derived from a record set; a pure fold with no hidden state.
#[derive(Clone, Copy, Serialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_count: usize,
    pub by_direction: ByDirection,
    /// Records whose direction could not be attributed
    pub unknown_count: usize,
    /// Received minus sent, in native units
    pub current_balance: f64,
}

impl AggregateStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TransactionRecord>) -> Self {
        let mut stats = records
            .into_iter()
            .fold(Self::default(), |mut stats, record| {
                stats.total_count += 1;
                match record.direction {
                    Direction::Received => stats.by_direction.received.add(record.lamports),
                    Direction::Sent => stats.by_direction.sent.add(record.lamports),
                    Direction::Unknown => stats.unknown_count += 1,
                }
                stats
            });
        let balance = stats.by_direction.received.lamports as i128
            - stats.by_direction.sent.lamports as i128;
        stats.current_balance = balance as f64 / LAMPORTS_PER_NATIVE as f64;
        stats
    }
}

/// What the presentation layers get for a stats request.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub stats: AggregateStats,
    pub recent: Vec<TransactionRecord>,
    /// When the remote was last consulted successfully
    pub last_fetch_timestamp: Option<DateTime<Utc>>,
    /// The snapshot is older than the staleness window
    pub stale: bool,
}

/// Outcome of an explicit refresh.
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub added_count: usize,
    pub total_count: usize,
}
