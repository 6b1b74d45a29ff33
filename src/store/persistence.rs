//! Persistence layer: sled-backed key-value backend

use crate::error::StorageError;
use crate::store::kv::{KvBackend, WriteBatch};
use std::path::Path;

/// Sled-based implementation of [`KvBackend`]
///
/// Uses a single sled tree; record kinds are separated by key prefix.
/// Batches map onto `sled::Batch`, which sled applies atomically.
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    /// Create a new SledBackend at the given path
    ///
    /// The path is a directory; sled creates its files there.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)
            .map_err(|e| StorageError::Backend(format!("Failed to open sled database: {}", e)))?;
        Ok(Self { db })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| StorageError::Backend(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

impl KvBackend for SledBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let value = self
            .db
            .get(key)
            .map_err(|e| StorageError::Backend(format!("Failed to get record: {}", e)))?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut rows = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (key, value) = item
                .map_err(|e| StorageError::Backend(format!("Failed to iterate store: {}", e)))?;
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }

    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut sled_batch = sled::Batch::default();
        for (key, value) in batch.into_ops() {
            match value {
                Some(value) => sled_batch.insert(key, value),
                None => sled_batch.remove(key),
            }
        }

        self.db
            .apply_batch(sled_batch)
            .map_err(|e| StorageError::Backend(format!("Failed to apply batch: {}", e)))?;

        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        SledBackend::flush(self)
    }
}
