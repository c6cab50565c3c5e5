use super::errors::DataStorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smallest indivisible units per native unit.
pub const LAMPORTS_PER_NATIVE: u64 = 1_000_000_000;

/// Converts lamports into native units.
pub fn lamports_to_native(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_NATIVE as f64
}

/// Direction of a native transfer relative to the tracked wallet.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Received,
    Sent,
    Unknown,
}

/// A classified transaction touching the tracked wallet.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Unique identifier for the transaction
    pub signature: String,
    /// Unix timestamp of the transaction, when the cluster reported one
    pub block_time: Option<i64>,
    /// Slot number in which the transaction was processed
    pub slot: u64,
    pub direction: Direction,
    /// Transferred amount in lamports, always zero for `Direction::Unknown`
    pub lamports: u64,
    /// Transferred amount in native units
    pub amount: f64,
    /// Sender when received, receiver when sent. Best effort only.
    pub counterparty: Option<String>,
}

impl TransactionRecord {
    pub fn new(
        signature: impl Into<String>,
        block_time: Option<i64>,
        slot: u64,
        direction: Direction,
        lamports: u64,
        counterparty: Option<String>,
    ) -> Self {
        let lamports = match direction {
            Direction::Unknown => 0,
            _ => lamports,
        };
        Self {
            signature: signature.into(),
            block_time,
            slot,
            direction,
            lamports,
            amount: lamports_to_native(lamports),
            counterparty,
        }
    }

    pub fn unknown(signature: impl Into<String>, block_time: Option<i64>, slot: u64) -> Self {
        Self::new(signature, block_time, slot, Direction::Unknown, 0, None)
    }
}

/// One entry of the remote signature index.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    /// Error reported by the cluster, if the transaction failed
    pub err: Option<String>,
}

/// Balance data of a fetched transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawMeta {
    pub err: Option<String>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
}

/// Transaction details as returned by the remote, stripped to what classification needs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTransaction {
    pub slot: u64,
    pub block_time: Option<i64>,
    /// Static keys followed by any loaded writable and readonly addresses
    pub account_keys: Vec<String>,
    pub meta: Option<RawMeta>,
}

/// How much detail to request per transaction.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetailMode {
    /// Parsed encoding, as much as the remote can give.
    #[default]
    Full,
    /// Plain json encoding; cheaper for the remote to build.
    Fast,
}

/// The persisted document for one wallet.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecords {
    pub records: Vec<TransactionRecord>,
    pub last_fetch_timestamp: Option<DateTime<Utc>>,
}

/// Result of a persistence request.
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    Committed,
    /// Inside the debounce window; nothing was written.
    Skipped,
    Failed,
}

/// Physical storage of record sets, keyed by wallet address.
#[async_trait::async_trait]
pub trait DataStorage {
    /// Loads the stored record set. `Ok(None)` when nothing was ever stored.
    async fn load(&self, address: &str) -> Result<Option<StoredRecords>, DataStorageError>;

    /// Replaces the stored record set as a whole.
    async fn save(&self, address: &str, records: &StoredRecords) -> Result<(), DataStorageError>;

    /// Removes everything stored for the address.
    async fn clear(&self, address: &str) -> Result<(), DataStorageError>;
}
