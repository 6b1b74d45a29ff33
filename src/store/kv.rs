//! Key-value record layer shared by every backend
//!
//! Records are bincode-encoded under typed key prefixes:
//!
//! - `tree:{repo}:{hash}` / `blob:{repo}:{hash}` / `commit:{repo}:{hash}`
//! - `branch:{repo}:{name}`
//! - `wip:{repo}:{branch_id}:{creator}`
//!
//! [`KvStore`] writes straight to the backend. Inside
//! [`Repo::run_in_transaction`] the callback instead receives a [`TxnView`]
//! that buffers writes and is applied as one atomic batch on success.

use crate::error::{StorageError, VersionError};
use crate::object::{Blob, Branch, Commit, TreeNode, WorkingInProcess};
use crate::store::{BranchRepo, CommitRepo, ObjectRepo, Repo, TxnFn, WipRepo};
use crate::types::Hash;
use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Ordered byte-keyed storage with atomic multi-key writes.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// All pairs whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    /// Apply every operation in the batch or none of them.
    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Make applied batches durable. No-op for volatile backends.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// A set of puts (`Some`) and deletes (`None`) applied atomically.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.insert(key, None);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> impl Iterator<Item = (Vec<u8>, Option<Vec<u8>>)> {
        self.ops.into_iter()
    }
}

/// Raw record access. Every type implementing it gets the store traits.
pub trait KvAccess {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
    fn write(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError>;
    fn remove(&self, key: Vec<u8>) -> Result<(), StorageError>;
}

fn tree_key(repository_id: Uuid, hash: &Hash) -> Vec<u8> {
    format!("tree:{repository_id}:{hash}").into_bytes()
}

fn blob_key(repository_id: Uuid, hash: &Hash) -> Vec<u8> {
    format!("blob:{repository_id}:{hash}").into_bytes()
}

fn commit_key(repository_id: Uuid, hash: &Hash) -> Vec<u8> {
    format!("commit:{repository_id}:{hash}").into_bytes()
}

fn branch_prefix(repository_id: Uuid) -> Vec<u8> {
    format!("branch:{repository_id}:").into_bytes()
}

fn branch_key(repository_id: Uuid, name: &str) -> Vec<u8> {
    let mut key = branch_prefix(repository_id);
    key.extend_from_slice(name.as_bytes());
    key
}

fn wip_prefix(repository_id: Uuid, branch_id: Uuid) -> Vec<u8> {
    format!("wip:{repository_id}:{branch_id}:").into_bytes()
}

fn wip_key(repository_id: Uuid, branch_id: Uuid, creator: &str) -> Vec<u8> {
    let mut key = wip_prefix(repository_id, branch_id);
    key.extend_from_slice(creator.as_bytes());
    key
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    Ok(bincode::deserialize(bytes)?)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    Ok(bincode::serialize(value)?)
}

fn get_record<K: KvAccess + ?Sized, T: DeserializeOwned>(
    kv: &K,
    key: &[u8],
) -> Result<Option<T>, StorageError> {
    kv.read(key)?.map(|bytes| decode(&bytes)).transpose()
}

/// Write only if absent. Content-addressed records never change, so an
/// existing row is already the right one.
fn put_if_absent<K: KvAccess + ?Sized, T: Serialize>(
    kv: &K,
    key: Vec<u8>,
    value: &T,
) -> Result<bool, StorageError> {
    if kv.read(&key)?.is_some() {
        return Ok(false);
    }
    kv.write(key, encode(value)?)?;
    Ok(true)
}

impl<K: KvAccess> ObjectRepo for K {
    fn insert_tree_node(&self, node: &TreeNode) -> Result<(), StorageError> {
        if put_if_absent(self, tree_key(node.repository_id, &node.hash), node)? {
            trace!(hash = %node.hash.short(), entries = node.entries().len(), "Inserted tree node");
        }
        Ok(())
    }

    fn insert_blob(&self, blob: &Blob) -> Result<(), StorageError> {
        put_if_absent(self, blob_key(blob.repository_id, &blob.hash), blob)?;
        Ok(())
    }

    fn get_tree_node(&self, repository_id: Uuid, hash: &Hash) -> Result<Option<TreeNode>, StorageError> {
        let node: Option<TreeNode> = get_record(self, &tree_key(repository_id, hash))?;
        if let Some(node) = &node {
            if node.hash != *hash {
                return Err(StorageError::HashMismatch {
                    expected: *hash,
                    actual: node.hash,
                });
            }
        }
        Ok(node)
    }

    fn get_blob(&self, repository_id: Uuid, hash: &Hash) -> Result<Option<Blob>, StorageError> {
        get_record(self, &blob_key(repository_id, hash))
    }
}

impl<K: KvAccess> CommitRepo for K {
    fn insert_commit(&self, commit: &Commit) -> Result<(), StorageError> {
        put_if_absent(self, commit_key(commit.repository_id, &commit.hash), commit)?;
        Ok(())
    }

    fn get_commit(&self, repository_id: Uuid, hash: &Hash) -> Result<Option<Commit>, StorageError> {
        get_record(self, &commit_key(repository_id, hash))
    }
}

impl<K: KvAccess> BranchRepo for K {
    fn get_branch(&self, repository_id: Uuid, name: &str) -> Result<Option<Branch>, StorageError> {
        get_record(self, &branch_key(repository_id, name))
    }

    fn insert_branch(&self, branch: &Branch) -> Result<(), StorageError> {
        if !put_if_absent(self, branch_key(branch.repository_id, &branch.name), branch)? {
            return Err(StorageError::AlreadyExists {
                kind: "branch",
                key: branch.name.clone(),
            });
        }
        Ok(())
    }

    fn update_branch_head(&self, repository_id: Uuid, name: &str, head: Option<Hash>) -> Result<Branch, StorageError> {
        let key = branch_key(repository_id, name);
        let mut branch: Branch = get_record(self, &key)?.ok_or_else(|| StorageError::NotFound {
            kind: "branch",
            key: name.to_string(),
        })?;
        branch.head = head;
        branch.updated_at = Utc::now();
        self.write(key, encode(&branch)?)?;
        Ok(branch)
    }

    fn delete_branch(&self, repository_id: Uuid, name: &str) -> Result<(), StorageError> {
        let key = branch_key(repository_id, name);
        if self.read(&key)?.is_none() {
            return Err(StorageError::NotFound {
                kind: "branch",
                key: name.to_string(),
            });
        }
        self.remove(key)
    }

    fn list_branches(&self, repository_id: Uuid) -> Result<Vec<Branch>, StorageError> {
        self.scan(&branch_prefix(repository_id))?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }
}

impl<K: KvAccess> WipRepo for K {
    fn get_wip(&self, repository_id: Uuid, branch_id: Uuid, creator: &str) -> Result<Option<WorkingInProcess>, StorageError> {
        get_record(self, &wip_key(repository_id, branch_id, creator))
    }

    fn insert_wip(&self, wip: &WorkingInProcess) -> Result<(), StorageError> {
        let key = wip_key(wip.repository_id, wip.branch_id, &wip.creator);
        if !put_if_absent(self, key, wip)? {
            return Err(StorageError::AlreadyExists {
                kind: "wip",
                key: format!("{}/{}", wip.branch_id, wip.creator),
            });
        }
        Ok(())
    }

    fn update_wip(&self, wip: &WorkingInProcess) -> Result<(), StorageError> {
        let key = wip_key(wip.repository_id, wip.branch_id, &wip.creator);
        if self.read(&key)?.is_none() {
            return Err(StorageError::NotFound {
                kind: "wip",
                key: format!("{}/{}", wip.branch_id, wip.creator),
            });
        }
        self.write(key, encode(wip)?)
    }

    fn delete_wip(&self, repository_id: Uuid, branch_id: Uuid, creator: &str) -> Result<(), StorageError> {
        let key = wip_key(repository_id, branch_id, creator);
        if self.read(&key)?.is_none() {
            return Err(StorageError::NotFound {
                kind: "wip",
                key: format!("{branch_id}/{creator}"),
            });
        }
        self.remove(key)
    }

    fn delete_wips_for_branch(&self, repository_id: Uuid, branch_id: Uuid) -> Result<usize, StorageError> {
        let rows = self.scan(&wip_prefix(repository_id, branch_id))?;
        let count = rows.len();
        for (key, _) in rows {
            self.remove(key)?;
        }
        Ok(count)
    }

    fn list_wips(&self, repository_id: Uuid, branch_id: Uuid) -> Result<Vec<WorkingInProcess>, StorageError> {
        self.scan(&wip_prefix(repository_id, branch_id))?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }
}

/// Store over any [`KvBackend`], implementing every collaborator trait.
pub struct KvStore {
    backend: Arc<dyn KvBackend>,
    /// Serialises transactions so a check-then-write inside one is not
    /// interleaved with another transaction's writes.
    txn_lock: Mutex<()>,
}

impl KvStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            txn_lock: Mutex::new(()),
        }
    }

    /// Store backed by a fresh in-memory map.
    pub fn memory() -> Self {
        Self::new(Arc::new(crate::store::MemoryBackend::new()))
    }

    /// Store backed by a sled database at `path`.
    pub fn open_sled<P: AsRef<std::path::Path>>(path: P) -> Result<Self, StorageError> {
        Ok(Self::new(Arc::new(crate::store::SledBackend::new(path)?)))
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.backend.flush()
    }
}

impl KvAccess for KvStore {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.backend.get(key)
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        self.backend.scan_prefix(prefix)
    }

    fn write(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.backend.apply_batch(batch)
    }

    fn remove(&self, key: Vec<u8>) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.backend.apply_batch(batch)
    }
}

impl Repo for KvStore {
    fn objects(&self) -> &dyn ObjectRepo {
        self
    }

    fn commits(&self) -> &dyn CommitRepo {
        self
    }

    fn run_in_transaction(&self, f: &mut TxnFn<'_>) -> Result<(), VersionError> {
        let _guard = self.txn_lock.lock();
        let view = TxnView::new(self.backend.as_ref());
        // An error drops `view` and every buffered write with it.
        f(&view)?;
        let batch = view.into_batch();
        debug!(writes = batch.len(), "Committing transaction");
        self.backend.apply_batch(batch)?;
        Ok(())
    }
}

/// Write-buffered view used inside a transaction. Reads see buffered writes
/// first, then the backend.
pub struct TxnView<'a> {
    backend: &'a dyn KvBackend,
    pending: RefCell<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl<'a> TxnView<'a> {
    fn new(backend: &'a dyn KvBackend) -> Self {
        Self {
            backend,
            pending: RefCell::new(BTreeMap::new()),
        }
    }

    fn into_batch(self) -> WriteBatch {
        WriteBatch {
            ops: self.pending.into_inner(),
        }
    }
}

impl KvAccess for TxnView<'_> {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(value) = self.pending.borrow().get(key) {
            return Ok(value.clone());
        }
        self.backend.get(key)
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.backend.scan_prefix(prefix)?.into_iter().collect();
        let pending = self.pending.borrow();
        for (key, value) in pending
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn write(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError> {
        self.pending.borrow_mut().insert(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: Vec<u8>) -> Result<(), StorageError> {
        self.pending.borrow_mut().insert(key, None);
        Ok(())
    }
}

impl Repo for TxnView<'_> {
    fn objects(&self) -> &dyn ObjectRepo {
        self
    }

    fn commits(&self) -> &dyn CommitRepo {
        self
    }

    fn run_in_transaction(&self, f: &mut TxnFn<'_>) -> Result<(), VersionError> {
        f(self)
    }
}
