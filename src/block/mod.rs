//! Blob byte storage
//!
//! The engine only stores blob metadata; the raw bytes live behind a
//! [`BlockAdapter`], addressed by the blob's content checksum. The address
//! shards on the first two hex characters of the checksum:
//! `{hex[0..2]}/{hex[2..]}`. Backends must keep that layout so stores written
//! by one adapter can be read by another.

pub mod local;
pub mod memory;

pub use local::LocalAdapter;
pub use memory::MemoryAdapter;

use crate::error::{StorageError, VersionError};
use crate::object::Blob;
use crate::store::ObjectRepo;
use crate::types::{Hash, Properties};
use std::io::{ErrorKind, Read, Write};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

pub type BlockReader = Box<dyn Read + Send>;

/// Byte storage keyed by (namespace, address).
pub trait BlockAdapter: Send + Sync {
    /// Store exactly `length` bytes from `reader`. A reader that yields a
    /// different number of bytes fails with `LengthMismatch` and stores
    /// nothing. Storing an address that already exists is a no-op.
    fn put(&self, namespace: &str, address: &str, reader: &mut dyn Read, length: u64) -> Result<(), StorageError>;

    fn get(&self, namespace: &str, address: &str) -> Result<BlockReader, StorageError>;

    /// Bytes `start..end` of the stored object. A range past the end is
    /// truncated.
    fn get_range(&self, namespace: &str, address: &str, start: u64, end: u64) -> Result<BlockReader, StorageError>;

    fn exists(&self, namespace: &str, address: &str) -> Result<bool, StorageError>;
}

/// Storage address for a content checksum.
pub fn content_address(check_sum: &Hash) -> String {
    let hex = check_sum.to_hex();
    format!("{}/{}", &hex[..2], &hex[2..])
}

/// Namespace holding a repository's blocks.
pub fn namespace(repository_id: Uuid) -> String {
    repository_id.to_string()
}

pub(crate) fn invalid_range(address: &str, start: u64, end: u64) -> StorageError {
    StorageError::Backend(format!("Invalid range {start}..{end} for {address}"))
}

/// Store the bytes of `reader` and record the resulting blob.
///
/// The bytes are hashed while they are staged in a temporary file, then
/// stored from that file at the sharded address of the checksum. Nothing is
/// stored if the reader fails.
pub fn write_blob(
    adapter: &dyn BlockAdapter,
    objects: &dyn ObjectRepo,
    repository_id: Uuid,
    reader: &mut dyn Read,
    properties: Properties,
) -> Result<Blob, VersionError> {
    let mut staged = NamedTempFile::new().map_err(StorageError::from)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut size = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(StorageError::from(e).into()),
        };
        hasher.update(&buf[..n]);
        staged.write_all(&buf[..n]).map_err(StorageError::from)?;
        size += n as u64;
    }
    staged.flush().map_err(StorageError::from)?;

    let check_sum: Hash = hasher.finalize().into();
    let address = content_address(&check_sum);
    let mut file = staged.reopen().map_err(StorageError::from)?;
    adapter.put(&namespace(repository_id), &address, &mut file, size)?;

    let blob = Blob::new(repository_id, check_sum, size, properties);
    objects.insert_blob(&blob)?;
    debug!(blob = %blob.hash.short(), size, address = %address, "Wrote blob");
    Ok(blob)
}

/// Read back every byte of a blob.
pub fn read_blob(adapter: &dyn BlockAdapter, blob: &Blob) -> Result<Vec<u8>, VersionError> {
    let address = content_address(&blob.check_sum);
    let mut reader = adapter.get(&namespace(blob.repository_id), &address)?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data).map_err(StorageError::from)?;
    if data.len() as u64 != blob.size {
        return Err(StorageError::LengthMismatch {
            address,
            expected: blob.size,
            actual: data.len() as u64,
        }
        .into());
    }
    Ok(data)
}
