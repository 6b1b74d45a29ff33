//! Integration tests for the key-value store: sled persistence and
//! transaction rollback

use super::test_utils::{operator, Fixture};
use std::sync::Arc;
use tempfile::TempDir;
use versa::store::{BranchRepo, CommitRepo, KvStore, Repo, SledBackend};
use versa::{CheckoutMode, TreeNode, VersionError, WorkRepository};

#[test]
fn test_history_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("store");

    let (repository_id, head) = {
        let backend = Arc::new(SledBackend::new(&db_path).unwrap());
        let fx = Fixture::with_store(KvStore::new(backend.clone()));
        let mut repo = fx.init("alice");
        fx.commit_files(&mut repo, "main", &[("data/a.csv", "1,2,3")], "first");
        let head = fx.commit_files(&mut repo, "main", &[("data/b.csv", "4,5,6")], "second");
        backend.flush().unwrap();
        (fx.repository_id, head.hash)
    };

    let store: Arc<dyn Repo> = Arc::new(KvStore::open_sled(&db_path).unwrap());
    let mut repo = WorkRepository::new(store.clone(), repository_id, operator("alice"));
    repo.checkout(CheckoutMode::Branch, "main").unwrap();
    assert_eq!(repo.current_branch().unwrap().head, Some(head));

    let leaves: Vec<String> = repo.walk_leaves("data").unwrap().into_iter().map(|(p, _)| p).collect();
    assert_eq!(leaves, vec!["data/a.csv", "data/b.csv"]);
    assert_eq!(repo.log(None).unwrap().len(), 2);

    // The wip survived too, with its base advanced to the head.
    repo.checkout(CheckoutMode::Wip, "main").unwrap();
    assert_eq!(repo.current_wip().unwrap().base_commit, Some(head));
}

#[test]
fn test_failed_transaction_discards_every_write() {
    let fx = Fixture::new();
    let repo = fx.init("alice");
    let id = fx.repository_id;
    let scratch = versa::Branch::new(id, "scratch", None, "alice");

    let err = fx
        .store
        .run_in_transaction(&mut |txn: &dyn Repo| {
            txn.insert_branch(&scratch)?;
            txn.insert_tree_node(&TreeNode::empty(id))?;
            assert!(txn.get_branch(id, "scratch")?.is_some());
            Err(VersionError::Conflict { path: "forced".into() })
        })
        .unwrap_err();
    assert!(matches!(err, VersionError::Conflict { .. }));
    assert!(fx.store.get_branch(id, "scratch").unwrap().is_none());
    assert_eq!(repo.list_branches().unwrap().len(), 1);
}

#[test]
fn test_nested_transaction_joins_outer() {
    let fx = Fixture::new();
    let _repo = fx.init("alice");
    let id = fx.repository_id;
    let inner = versa::Branch::new(id, "inner", None, "alice");

    let result = fx.store.run_in_transaction(&mut |txn: &dyn Repo| {
        txn.run_in_transaction(&mut |nested: &dyn Repo| {
            nested.insert_branch(&inner)?;
            Ok(())
        })?;
        Err(VersionError::Cancelled)
    });
    assert!(matches!(result, Err(VersionError::Cancelled)));
    assert!(fx.store.get_branch(id, "inner").unwrap().is_none());
}

#[test]
fn test_commit_records_are_content_addressed() {
    let fx = Fixture::new();
    let mut repo = fx.init("alice");
    let commit = fx.commit_files(&mut repo, "main", &[("a.txt", "a")], "first");

    let stored = fx.store.get_commit(fx.repository_id, &commit.hash).unwrap().unwrap();
    assert_eq!(stored, commit);
    assert!(fx
        .store
        .get_commit(uuid::Uuid::new_v4(), &commit.hash)
        .unwrap()
        .is_none());
}
