use crate::domain::errors::DataStorageError;
use crate::domain::models::{DataStorage, SaveOutcome, StoredRecords};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Loads and saves one wallet's record set on top of a [`DataStorage`] backend.
///
/// Loading never fails: a missing or unreadable document yields `None` so that
/// ingestion can start from empty state. Saving is debounced; `flush` bypasses
/// the window for checkpoints that must not be dropped.
pub struct PersistenceGateway<D> {
    storage: Arc<D>,
    address: String,
    debounce: Duration,
    last_write: Mutex<Option<Instant>>,
}

impl<D> PersistenceGateway<D>
where
    D: DataStorage + Send + Sync,
{
    pub fn new(storage: Arc<D>, address: impl Into<String>, debounce: Duration) -> Self {
        Self {
            storage,
            address: address.into(),
            debounce,
            last_write: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn load(&self) -> Option<StoredRecords> {
        match self.storage.load(&self.address).await {
            Ok(Some(stored)) => {
                tracing::info!(
                    "Loaded {} stored records for {}",
                    stored.records.len(),
                    self.address
                );
                Some(stored)
            }
            Ok(None) => {
                tracing::info!("No stored records for {}", self.address);
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable stored records for {}: {}",
                    self.address,
                    e
                );
                None
            }
        }
    }

    /// Writes the record set unless the previous write is inside the debounce window.
    pub async fn save(&self, records: &StoredRecords) -> SaveOutcome {
        let mut last_write = self.last_write.lock().await;
        if let Some(at) = *last_write {
            if at.elapsed() < self.debounce {
                tracing::debug!("Save for {} skipped inside debounce window", self.address);
                return SaveOutcome::Skipped;
            }
        }
        self.write(records, &mut last_write).await
    }

    /// Writes the record set regardless of the debounce window.
    pub async fn flush(&self, records: &StoredRecords) -> SaveOutcome {
        let mut last_write = self.last_write.lock().await;
        self.write(records, &mut last_write).await
    }

    /// Drops everything stored for the wallet.
    pub async fn clear(&self) -> Result<(), DataStorageError> {
        self.storage.clear(&self.address).await?;
        tracing::warn!("Cleared stored records for {}", self.address);
        Ok(())
    }

    async fn write(&self, records: &StoredRecords, last_write: &mut Option<Instant>) -> SaveOutcome {
        match self.storage.save(&self.address, records).await {
            Ok(()) => {
                *last_write = Some(Instant::now());
                tracing::info!(
                    "Saved {} records for {}",
                    records.records.len(),
                    self.address
                );
                SaveOutcome::Committed
            }
            Err(e) => {
                tracing::error!("Failed to save records for {}: {}", self.address, e);
                SaveOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Direction, TransactionRecord};
    use crate::infrastructure::file_store::FileStore;
    use crate::infrastructure::memory::InMemoryDatabase;

    fn records(signatures: &[&str]) -> StoredRecords {
        StoredRecords {
            records: signatures
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    TransactionRecord::new(
                        *s,
                        Some(i as i64),
                        i as u64,
                        Direction::Sent,
                        1_000_000_000,
                        None,
                    )
                })
                .collect(),
            last_fetch_timestamp: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_save_inside_window_is_skipped() {
        let storage = Arc::new(InMemoryDatabase::default());
        let gateway = PersistenceGateway::new(storage.clone(), "wallet", Duration::from_secs(5));

        assert_eq!(gateway.save(&records(&["a"])).await, SaveOutcome::Committed);
        assert_eq!(gateway.save(&records(&["a", "b"])).await, SaveOutcome::Skipped);
        assert_eq!(storage.load("wallet").await.unwrap(), Some(records(&["a"])));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(gateway.save(&records(&["a", "b"])).await, SaveOutcome::Committed);
        assert_eq!(storage.load("wallet").await.unwrap(), Some(records(&["a", "b"])));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_ignores_window() {
        let storage = Arc::new(InMemoryDatabase::default());
        let gateway = PersistenceGateway::new(storage.clone(), "wallet", Duration::from_secs(5));

        assert_eq!(gateway.save(&records(&["a"])).await, SaveOutcome::Committed);
        assert_eq!(gateway.flush(&records(&["a", "b"])).await, SaveOutcome::Committed);
        assert_eq!(storage.load("wallet").await.unwrap(), Some(records(&["a", "b"])));
    }

    #[tokio::test]
    async fn corrupt_store_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wallet.json"), b"not json").unwrap();
        let gateway = PersistenceGateway::new(
            Arc::new(FileStore::new(dir.path())),
            "wallet",
            Duration::ZERO,
        );

        assert!(gateway.load().await.is_none());
        assert_eq!(gateway.save(&records(&["a"])).await, SaveOutcome::Committed);
        assert_eq!(gateway.load().await, Some(records(&["a"])));
    }

    #[tokio::test]
    async fn failed_write_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        // the store directory path is occupied by a regular file
        let gateway =
            PersistenceGateway::new(Arc::new(FileStore::new(&blocker)), "wallet", Duration::ZERO);

        assert_eq!(gateway.save(&records(&["a"])).await, SaveOutcome::Failed);
    }
}
