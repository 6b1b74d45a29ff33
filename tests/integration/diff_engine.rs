//! Integration tests for the merkle diff engine

use super::test_utils::Fixture;
use std::ops::ControlFlow;
use versa::store::Repo;
use versa::{diff_trees, Action, Cancellation, TreeNode, VersionError, WorkTree};

fn summary(changes: &versa::Changes) -> Vec<(String, Action)> {
    changes.iter().map(|c| (c.path.clone(), c.action)).collect()
}

#[test]
fn test_diff_reports_leaf_changes_in_path_order() {
    let fx = Fixture::new();
    let cancel = Cancellation::new();
    let mut tree = WorkTree::empty(fx.store.objects(), fx.repository_id);
    tree.add_leaf("a.txt", &fx.blob("a")).unwrap();
    tree.add_leaf("a/b.txt", &fx.blob("b")).unwrap();
    tree.add_leaf("gone.txt", &fx.blob("g")).unwrap();
    let before = tree.root();

    tree.replace_leaf("a.txt", &fx.blob("a2")).unwrap();
    tree.remove_entry("gone.txt").unwrap();
    tree.add_leaf("new/deep/file.txt", &fx.blob("n")).unwrap();
    let after = tree.root();

    let changes = diff_trees(fx.store.objects(), fx.repository_id, &before, &after, &cancel).unwrap();
    assert_eq!(
        summary(&changes),
        vec![
            ("a.txt".to_string(), Action::Modify),
            ("gone.txt".to_string(), Action::Delete),
            ("new/deep/file.txt".to_string(), Action::Insert),
        ]
    );
    assert_eq!(changes.get(0).unwrap().to_hash(), Some(fx.blob("a2").hash));
    assert_eq!(changes.get(1).unwrap().to_hash(), None);
}

#[test]
fn test_diff_of_identical_trees_is_empty() {
    let fx = Fixture::new();
    let mut tree = WorkTree::empty(fx.store.objects(), fx.repository_id);
    tree.add_leaf("x/y.txt", &fx.blob("y")).unwrap();
    let root = tree.root();

    let changes = diff_trees(fx.store.objects(), fx.repository_id, &root, &root, &Cancellation::new()).unwrap();
    assert!(changes.is_empty());
    assert_eq!(changes.num(), 0);
}

#[test]
fn test_directory_replaced_by_file() {
    let fx = Fixture::new();
    let mut tree = WorkTree::empty(fx.store.objects(), fx.repository_id);
    tree.add_leaf("data/one.csv", &fx.blob("1")).unwrap();
    tree.add_leaf("data/two.csv", &fx.blob("2")).unwrap();
    let before = tree.root();

    tree.remove_entry("data").unwrap();
    tree.add_leaf("data", &fx.blob("flat")).unwrap();
    let after = tree.root();

    let changes = diff_trees(fx.store.objects(), fx.repository_id, &before, &after, &Cancellation::new()).unwrap();
    assert_eq!(
        summary(&changes),
        vec![
            ("data".to_string(), Action::Insert),
            ("data/one.csv".to_string(), Action::Delete),
            ("data/two.csv".to_string(), Action::Delete),
        ]
    );
}

#[test]
fn test_diff_from_empty_root_expands_everything() {
    let fx = Fixture::new();
    let mut tree = WorkTree::empty(fx.store.objects(), fx.repository_id);
    tree.add_leaf("b/c.txt", &fx.blob("c")).unwrap();
    tree.add_leaf("a.txt", &fx.blob("a")).unwrap();

    let changes = diff_trees(
        fx.store.objects(),
        fx.repository_id,
        &TreeNode::empty_hash(),
        &tree.root(),
        &Cancellation::new(),
    )
    .unwrap();
    assert_eq!(
        summary(&changes),
        vec![("a.txt".to_string(), Action::Insert), ("b/c.txt".to_string(), Action::Insert)]
    );
}

#[test]
fn test_changes_cursor_and_early_stop() {
    let fx = Fixture::new();
    let mut tree = WorkTree::empty(fx.store.objects(), fx.repository_id);
    for name in ["1.txt", "2.txt", "3.txt"] {
        tree.add_leaf(name, &fx.blob(name)).unwrap();
    }
    let mut changes = diff_trees(
        fx.store.objects(),
        fx.repository_id,
        &TreeNode::empty_hash(),
        &tree.root(),
        &Cancellation::new(),
    )
    .unwrap();

    assert_eq!(changes.next_change().unwrap().path, "1.txt");
    assert_eq!(changes.next_change().unwrap().path, "2.txt");
    changes.back();
    assert_eq!(changes.next_change().unwrap().path, "2.txt");
    changes.reset();
    assert_eq!(changes.next_change().unwrap().path, "1.txt");

    let mut visited = Vec::new();
    changes
        .for_each(|c| {
            visited.push(c.path.clone());
            Ok(if visited.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })
        .unwrap();
    assert_eq!(visited, vec!["1.txt", "2.txt"]);
}

#[test]
fn test_cancelled_diff_fails() {
    let fx = Fixture::new();
    let mut tree = WorkTree::empty(fx.store.objects(), fx.repository_id);
    tree.add_leaf("a.txt", &fx.blob("a")).unwrap();

    let cancel = Cancellation::new();
    cancel.cancel();
    let err = diff_trees(
        fx.store.objects(),
        fx.repository_id,
        &TreeNode::empty_hash(),
        &tree.root(),
        &cancel,
    )
    .unwrap_err();
    assert!(matches!(err, VersionError::Cancelled));
}
