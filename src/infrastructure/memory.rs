use crate::domain::{
    errors::DataStorageError,
    models::{DataStorage, StoredRecords},
};
use dashmap::DashMap;

/// Process-local storage, one record set per wallet address.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    // address -> full record set
    record_sets: DashMap<String, StoredRecords>,
}

#[async_trait::async_trait]
impl DataStorage for InMemoryDatabase {
    async fn load(&self, address: &str) -> Result<Option<StoredRecords>, DataStorageError> {
        Ok(self.record_sets.get(address).map(|v| v.value().clone()))
    }

    async fn save(&self, address: &str, records: &StoredRecords) -> Result<(), DataStorageError> {
        // Whole-value insert; readers never observe a partially replaced set.
        self.record_sets
            .insert(address.to_string(), records.clone());
        Ok(())
    }

    async fn clear(&self, address: &str) -> Result<(), DataStorageError> {
        if self.record_sets.remove(address).is_none() {
            tracing::warn!("Nothing stored for {} to clear", address);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Direction, TransactionRecord};

    #[tokio::test]
    async fn keeps_wallets_apart() {
        let db = InMemoryDatabase::default();
        let stored = StoredRecords {
            records: vec![TransactionRecord::new(
                "s1",
                Some(10),
                1,
                Direction::Received,
                5,
                None,
            )],
            last_fetch_timestamp: None,
        };

        db.save("alice", &stored).await.unwrap();
        assert_eq!(db.load("alice").await.unwrap(), Some(stored));
        assert_eq!(db.load("bob").await.unwrap(), None);
        assert_eq!(db.record_sets.len(), 1);

        db.clear("alice").await.unwrap();
        assert_eq!(db.load("alice").await.unwrap(), None);
    }
}
