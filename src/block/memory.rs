//! In-memory block adapter for tests and ephemeral stores

use super::{invalid_range, BlockAdapter, BlockReader};
use crate::error::StorageError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct MemoryAdapter {
    blocks: RwLock<HashMap<(String, String), Arc<Vec<u8>>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    fn load(&self, namespace: &str, address: &str) -> Result<Arc<Vec<u8>>, StorageError> {
        self.blocks
            .read()
            .get(&(namespace.to_string(), address.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "block",
                key: format!("{namespace}/{address}"),
            })
    }
}

impl BlockAdapter for MemoryAdapter {
    fn put(&self, namespace: &str, address: &str, reader: &mut dyn Read, length: u64) -> Result<(), StorageError> {
        let key = (namespace.to_string(), address.to_string());
        if self.blocks.read().contains_key(&key) {
            return Ok(());
        }
        let mut data = Vec::new();
        reader.take(length.saturating_add(1)).read_to_end(&mut data)?;
        if data.len() as u64 != length {
            return Err(StorageError::LengthMismatch {
                address: address.to_string(),
                expected: length,
                actual: data.len() as u64,
            });
        }
        self.blocks.write().entry(key).or_insert_with(|| Arc::new(data));
        Ok(())
    }

    fn get(&self, namespace: &str, address: &str) -> Result<BlockReader, StorageError> {
        let data = self.load(namespace, address)?;
        Ok(Box::new(Cursor::new(data.as_ref().clone())))
    }

    fn get_range(&self, namespace: &str, address: &str, start: u64, end: u64) -> Result<BlockReader, StorageError> {
        if start > end {
            return Err(invalid_range(address, start, end));
        }
        let data = self.load(namespace, address)?;
        let len = data.len();
        let start = usize::try_from(start).unwrap_or(len).min(len);
        let end = usize::try_from(end).unwrap_or(len).min(len);
        Ok(Box::new(Cursor::new(data[start..end].to_vec())))
    }

    fn exists(&self, namespace: &str, address: &str) -> Result<bool, StorageError> {
        Ok(self
            .blocks
            .read()
            .contains_key(&(namespace.to_string(), address.to_string())))
    }
}
