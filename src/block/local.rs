//! Filesystem block adapter

use super::{invalid_range, BlockAdapter, BlockReader};
use crate::error::StorageError;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Stores blocks under `{root}/{namespace}/{address}`.
///
/// Writes go to a `.tmp` sibling first and are renamed into place, so a
/// reader never observes a partial block.
#[derive(Debug, Clone)]
pub struct LocalAdapter {
    root: PathBuf,
}

impl LocalAdapter {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::IoError(io::Error::new(
                e.kind(),
                format!("Failed to create block root at {:?}: {}", root, e),
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn block_path(&self, namespace: &str, address: &str) -> PathBuf {
        self.root.join(namespace).join(address)
    }

    fn open(&self, namespace: &str, address: &str) -> Result<File, StorageError> {
        File::open(self.block_path(namespace, address)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                kind: "block",
                key: format!("{namespace}/{address}"),
            },
            _ => StorageError::IoError(e),
        })
    }
}

impl BlockAdapter for LocalAdapter {
    fn put(&self, namespace: &str, address: &str, reader: &mut dyn Read, length: u64) -> Result<(), StorageError> {
        let path = self.block_path(namespace, address);
        if path.exists() {
            trace!(address, "Block already stored");
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let written = {
            let mut file = File::create(&temp_path)?;
            let written = io::copy(&mut reader.take(length.saturating_add(1)), &mut file);
            match written.and_then(|n| file.sync_all().map(|_| n)) {
                Ok(n) => n,
                Err(e) => {
                    let _ = fs::remove_file(&temp_path);
                    return Err(e.into());
                }
            }
        };
        if written != length {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::LengthMismatch {
                address: address.to_string(),
                expected: length,
                actual: written,
            });
        }

        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::IoError(io::Error::new(
                e.kind(),
                format!("Failed to rename temp file to {:?}: {}", path, e),
            ))
        })?;
        trace!(address, length, "Stored block");
        Ok(())
    }

    fn get(&self, namespace: &str, address: &str) -> Result<BlockReader, StorageError> {
        Ok(Box::new(self.open(namespace, address)?))
    }

    fn get_range(&self, namespace: &str, address: &str, start: u64, end: u64) -> Result<BlockReader, StorageError> {
        if start > end {
            return Err(invalid_range(address, start, end));
        }
        let mut file = self.open(namespace, address)?;
        file.seek(SeekFrom::Start(start))?;
        Ok(Box::new(file.take(end - start)))
    }

    fn exists(&self, namespace: &str, address: &str) -> Result<bool, StorageError> {
        Ok(self.block_path(namespace, address).is_file())
    }
}
