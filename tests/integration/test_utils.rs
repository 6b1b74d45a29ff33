//! Shared test utilities for integration tests
//!
//! A fixture bundles an in-memory store, an in-memory block adapter and a
//! repository id, plus helpers to write blobs and commit whole file sets.

use std::sync::Arc;
use uuid::Uuid;
use versa::block::{read_blob, write_blob, MemoryAdapter};
use versa::merge::LowestHashResolver;
use versa::store::{KvStore, Repo};
use versa::types::{Operator, Properties};
use versa::{Blob, CheckoutMode, Commit, WorkRepository};

pub fn operator(name: &str) -> Operator {
    Operator::new(name, format!("{}@example.com", name))
}

pub struct Fixture {
    pub store: Arc<KvStore>,
    pub blocks: MemoryAdapter,
    pub repository_id: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(KvStore::memory())
    }

    pub fn with_store(store: KvStore) -> Self {
        Self {
            store: Arc::new(store),
            blocks: MemoryAdapter::new(),
            repository_id: Uuid::new_v4(),
        }
    }

    /// Store `content` as a regular file blob.
    pub fn blob(&self, content: &str) -> Blob {
        write_blob(
            &self.blocks,
            self.store.objects(),
            self.repository_id,
            &mut content.as_bytes(),
            Properties::regular(),
        )
        .unwrap()
    }

    /// Repository with an unborn `main` branch, checked out for `user`.
    pub fn init(&self, user: &str) -> WorkRepository {
        WorkRepository::init(self.store.clone(), self.repository_id, operator(user), "main").unwrap()
    }

    /// Another instance on the same repository.
    pub fn open(&self, user: &str) -> WorkRepository {
        WorkRepository::new(self.store.clone(), self.repository_id, operator(user))
    }

    /// Contents of a file in the repository's current checkout.
    pub fn read(&self, repo: &WorkRepository, path: &str) -> String {
        let blob = repo.find_blob(path).unwrap();
        String::from_utf8(read_blob(&self.blocks, &blob).unwrap()).unwrap()
    }

    /// Write every `(path, content)` into the user's wip on `branch` and
    /// commit. A wip left behind by an earlier branch move is rebased first.
    pub fn commit_files(
        &self,
        repo: &mut WorkRepository,
        branch: &str,
        files: &[(&str, &str)],
        message: &str,
    ) -> Commit {
        repo.checkout(CheckoutMode::Branch, branch).unwrap();
        let head = repo.current_branch().unwrap().head;
        let wip = repo.get_or_create_wip().unwrap();
        if wip.base_commit != head {
            repo.rebase_wip(&LowestHashResolver).unwrap();
        }
        for (path, content) in files {
            let blob = self.blob(content);
            if repo.find_blob(path).is_ok() {
                repo.replace_leaf(path, &blob).unwrap();
            } else {
                repo.add_leaf(path, &blob).unwrap();
            }
        }
        repo.commit_changes(message).unwrap()
    }

    /// Every leaf path in the repository's current checkout.
    pub fn paths(&self, repo: &WorkRepository) -> Vec<String> {
        repo.walk_leaves("").unwrap().into_iter().map(|(p, _)| p).collect()
    }
}
