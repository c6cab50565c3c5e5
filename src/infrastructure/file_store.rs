use crate::domain::{
    errors::DataStorageError,
    models::{DataStorage, StoredRecords},
};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Stores each wallet's record set as one JSON document under a directory.
///
/// Writes go to a sibling temporary file which is synced and then renamed over
/// the document, so a crash mid-write leaves the previous version intact.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn document_path(&self, address: &str) -> PathBuf {
        self.dir.join(format!("{address}.json"))
    }

    fn staging_path(&self, address: &str) -> PathBuf {
        self.dir.join(format!(".{address}.json.tmp"))
    }
}

#[async_trait::async_trait]
impl DataStorage for FileStore {
    async fn load(&self, address: &str) -> Result<Option<StoredRecords>, DataStorageError> {
        let path = self.document_path(address);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| DataStorageError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    async fn save(&self, address: &str, records: &StoredRecords) -> Result<(), DataStorageError> {
        let bytes = serde_json::to_vec(records)?;
        fs::create_dir_all(&self.dir).await?;

        let staging = self.staging_path(address);
        let mut file = fs::File::create(&staging).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&staging, self.document_path(address)).await?;
        tracing::debug!(
            "Wrote {} records for {} to {}",
            records.records.len(),
            address,
            self.dir.display()
        );
        Ok(())
    }

    async fn clear(&self, address: &str) -> Result<(), DataStorageError> {
        match fs::remove_file(self.document_path(address)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Direction, TransactionRecord};
    use chrono::{TimeZone, Utc};

    fn sample() -> StoredRecords {
        StoredRecords {
            records: vec![
                TransactionRecord::new("s2", Some(20), 2, Direction::Sent, 250_000_000, None),
                TransactionRecord::unknown("s1", Some(10), 1),
            ],
            last_fetch_timestamp: Utc.timestamp_opt(1_700_000_000, 0).single(),
        }
    }

    #[tokio::test]
    async fn missing_document_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load("wallet").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_document_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        store.save("wallet", &sample()).await.unwrap();
        assert_eq!(store.load("wallet").await.unwrap(), Some(sample()));
        assert!(!store.staging_path("wallet").exists());
    }

    #[tokio::test]
    async fn corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(store.document_path("wallet"), b"{\"records\": [").unwrap();

        let result = store.load("wallet").await;
        assert!(matches!(result, Err(DataStorageError::Corrupt(_))));
    }

    #[tokio::test]
    async fn clear_removes_document_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.save("wallet", &sample()).await.unwrap();

        store.clear("wallet").await.unwrap();
        assert!(store.load("wallet").await.unwrap().is_none());
        store.clear("wallet").await.unwrap();
    }
}
