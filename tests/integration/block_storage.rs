//! Integration tests for blob byte storage through the block adapters

use std::io::Read;
use tempfile::TempDir;
use uuid::Uuid;
use versa::block::{content_address, namespace, read_blob, write_blob, BlockAdapter, LocalAdapter, MemoryAdapter};
use versa::store::{KvStore, ObjectRepo};
use versa::types::Properties;
use versa::{StorageError, VersionError};

#[test]
fn test_local_adapter_shards_by_checksum() {
    let temp_dir = TempDir::new().unwrap();
    let adapter = LocalAdapter::new(temp_dir.path().join("blocks")).unwrap();
    let store = KvStore::memory();
    let repo = Uuid::new_v4();

    let blob = write_blob(&adapter, &store, repo, &mut "column,values\n1,2\n".as_bytes(), Properties::regular())
        .unwrap();

    let hex = blob.check_sum.to_hex();
    let on_disk = temp_dir
        .path()
        .join("blocks")
        .join(repo.to_string())
        .join(&hex[..2])
        .join(&hex[2..]);
    assert!(on_disk.is_file());
    assert_eq!(content_address(&blob.check_sum), format!("{}/{}", &hex[..2], &hex[2..]));

    assert_eq!(store.get_blob(repo, &blob.hash).unwrap().unwrap(), blob);
    assert_eq!(read_blob(&adapter, &blob).unwrap(), b"column,values\n1,2\n");
}

#[test]
fn test_identical_content_is_stored_once() {
    let adapter = MemoryAdapter::new();
    let store = KvStore::memory();
    let repo = Uuid::new_v4();

    let first = write_blob(&adapter, &store, repo, &mut "same".as_bytes(), Properties::regular()).unwrap();
    let second = write_blob(&adapter, &store, repo, &mut "same".as_bytes(), Properties::executable()).unwrap();

    assert_eq!(first.check_sum, second.check_sum);
    // Properties are part of the blob fingerprint but not of the block address.
    assert_ne!(first.hash, second.hash);
    assert_eq!(adapter.len(), 1);
}

#[test]
fn test_range_reads() {
    let temp_dir = TempDir::new().unwrap();
    let adapter = LocalAdapter::new(temp_dir.path()).unwrap();
    let ns = namespace(Uuid::new_v4());
    adapter.put(&ns, "ab/cdef", &mut "0123456789".as_bytes(), 10).unwrap();

    let mut out = String::new();
    adapter.get_range(&ns, "ab/cdef", 2, 5).unwrap().read_to_string(&mut out).unwrap();
    assert_eq!(out, "234");

    let mut tail = String::new();
    adapter.get_range(&ns, "ab/cdef", 8, 100).unwrap().read_to_string(&mut tail).unwrap();
    assert_eq!(tail, "89");

    assert!(adapter.exists(&ns, "ab/cdef").unwrap());
    assert!(!adapter.exists(&ns, "ab/none").unwrap());
}

#[test]
fn test_short_reader_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let adapter = LocalAdapter::new(temp_dir.path()).unwrap();

    let err = adapter.put("ns", "aa/bbbb", &mut "short".as_bytes(), 10).unwrap_err();
    assert!(matches!(err, StorageError::LengthMismatch { expected: 10, actual: 5, .. }));
    assert!(!adapter.exists("ns", "aa/bbbb").unwrap());
}

#[test]
fn test_missing_block_is_not_found() {
    let adapter = MemoryAdapter::new();
    let store = KvStore::memory();
    let repo = Uuid::new_v4();
    let blob = write_blob(&adapter, &store, repo, &mut "x".as_bytes(), Properties::regular()).unwrap();

    let other = MemoryAdapter::new();
    let err = read_blob(&other, &blob).unwrap_err();
    assert!(matches!(
        err,
        VersionError::StorageError(StorageError::NotFound { kind: "block", .. })
    ));
}
