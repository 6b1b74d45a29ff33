//! Integration tests for wip staleness, rebase and the checkout state machine

use super::test_utils::Fixture;
use versa::merge::StrictResolver;
use versa::{CheckoutMode, RepoState, TreeNode, VersionError};

#[test]
fn test_second_user_commit_is_rejected_as_stale() {
    let fx = Fixture::new();
    let mut alice = fx.init("alice");
    let base = fx.commit_files(&mut alice, "main", &[("shared.txt", "v1")], "base");

    let mut bob = fx.open("bob");
    bob.checkout(CheckoutMode::Branch, "main").unwrap();
    bob.get_or_create_wip().unwrap();
    bob.add_leaf("bob.txt", &fx.blob("bob")).unwrap();

    let advanced = fx.commit_files(&mut alice, "main", &[("alice.txt", "alice")], "alice moves main");

    let err = bob.commit_changes("bob's work").unwrap_err();
    match err {
        VersionError::StaleWip { base: stale, head } => {
            assert_eq!(stale, Some(base.hash));
            assert_eq!(head, Some(advanced.hash));
        }
        other => panic!("expected StaleWip, got {other:?}"),
    }

    // Rebasing replays bob's edit onto the new head.
    let wip = bob.rebase_wip(&StrictResolver).unwrap();
    assert_eq!(wip.base_commit, Some(advanced.hash));
    let commit = bob.commit_changes("bob's work").unwrap();
    assert_eq!(commit.parent_hashes, vec![advanced.hash]);
    assert_eq!(fx.paths(&bob), vec!["alice.txt", "bob.txt", "shared.txt"]);
}

#[test]
fn test_cached_wip_behind_storage_is_stale() {
    let fx = Fixture::new();
    let mut first = fx.init("alice");
    fx.commit_files(&mut first, "main", &[("a.txt", "1")], "one");

    // Two instances for the same user share one wip record.
    let mut second = fx.open("alice");
    second.checkout(CheckoutMode::Wip, "main").unwrap();
    first.checkout(CheckoutMode::Wip, "main").unwrap();

    first.add_leaf("b.txt", &fx.blob("b")).unwrap();
    let committed = first.commit_changes("from first").unwrap();

    // The edit is refused before it can overwrite the committed wip.
    match second.add_leaf("c.txt", &fx.blob("c")).unwrap_err() {
        VersionError::StaleWip { head, .. } => assert_eq!(head, Some(committed.hash)),
        other => panic!("expected StaleWip, got {other:?}"),
    }
    assert!(matches!(second.revert_wip(), Err(VersionError::StaleWip { .. })));

    let mut fresh = fx.open("alice");
    fresh.checkout(CheckoutMode::Wip, "main").unwrap();
    assert_eq!(fresh.current_wip().unwrap().base_commit, Some(committed.hash));
    assert_eq!(fx.paths(&fresh), vec!["a.txt", "b.txt"]);

    // Reloading the wip makes the instance current again.
    second.rebase_wip(&StrictResolver).unwrap();
    second.add_leaf("c.txt", &fx.blob("c")).unwrap();
    let commit = second.commit_changes("from second").unwrap();
    assert_eq!(commit.parent_hashes, vec![committed.hash]);
    assert_eq!(fx.paths(&second), vec!["a.txt", "b.txt", "c.txt"]);
}

#[test]
fn test_interleaved_wip_edits_are_not_lost() {
    let fx = Fixture::new();
    let mut first = fx.init("alice");
    fx.commit_files(&mut first, "main", &[("a.txt", "1")], "one");

    let mut second = fx.open("alice");
    second.checkout(CheckoutMode::Wip, "main").unwrap();
    first.checkout(CheckoutMode::Wip, "main").unwrap();

    first.add_leaf("b.txt", &fx.blob("b")).unwrap();
    assert!(matches!(
        second.add_leaf("c.txt", &fx.blob("c")),
        Err(VersionError::StaleWip { .. })
    ));

    first.commit_changes("from first").unwrap();
    assert_eq!(fx.paths(&first), vec!["a.txt", "b.txt"]);
}

#[test]
fn test_status_revert_and_delete_wip() {
    let fx = Fixture::new();
    let mut repo = fx.init("alice");
    fx.commit_files(&mut repo, "main", &[("keep.txt", "k")], "base");

    repo.checkout(CheckoutMode::Wip, "main").unwrap();
    repo.add_leaf("new.txt", &fx.blob("n")).unwrap();
    repo.remove_entry("keep.txt").unwrap();

    let status: Vec<String> = repo.status().unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(status, vec!["delete keep.txt", "insert new.txt"]);

    repo.revert_wip().unwrap();
    assert!(repo.status().unwrap().is_empty());
    assert_eq!(fx.paths(&repo), vec!["keep.txt"]);

    repo.delete_wip().unwrap();
    assert_eq!(repo.state(), Some(RepoState::InBranch));
    assert!(matches!(
        repo.checkout(CheckoutMode::Wip, "main"),
        Err(VersionError::NotFound { kind: "wip", .. })
    ));
}

#[test]
fn test_operations_outside_their_state_fail() {
    let fx = Fixture::new();
    let mut repo = fx.open("alice");
    assert_eq!(repo.state(), None);
    assert!(matches!(repo.add_leaf("a.txt", &fx.blob("a")), Err(VersionError::InvalidState { .. })));
    assert!(matches!(repo.commit_changes("x"), Err(VersionError::InvalidState { .. })));

    let mut repo = fx.init("alice");
    assert_eq!(repo.state(), Some(RepoState::InBranch));
    assert_eq!(repo.current_tree(), Some(TreeNode::empty_hash()));
    assert!(matches!(repo.status(), Err(VersionError::InvalidState { .. })));

    let commit = fx.commit_files(&mut repo, "main", &[("a.txt", "a")], "first");
    repo.checkout(CheckoutMode::Commit, &commit.hash.to_hex()).unwrap();
    assert_eq!(repo.state(), Some(RepoState::InCommit));
    assert!(matches!(
        repo.get_or_create_wip(),
        Err(VersionError::InvalidState { .. })
    ));
    assert_eq!(fx.read(&repo, "a.txt"), "a");
}

#[test]
fn test_delete_current_branch_resets_checkout() {
    let fx = Fixture::new();
    let mut repo = fx.init("alice");
    let commit = fx.commit_files(&mut repo, "main", &[("a.txt", "a")], "first");
    repo.create_branch("topic", Some(commit.hash)).unwrap();
    fx.commit_files(&mut repo, "topic", &[("t.txt", "t")], "topic work");

    repo.checkout(CheckoutMode::Branch, "topic").unwrap();
    repo.delete_branch("topic").unwrap();
    assert_eq!(repo.state(), None);

    let names: Vec<String> = repo.list_branches().unwrap().into_iter().map(|b| b.name).collect();
    assert_eq!(names, vec!["main"]);
    assert!(matches!(
        repo.checkout(CheckoutMode::Branch, "topic"),
        Err(VersionError::NotFound { .. })
    ));
}

#[test]
fn test_branch_names_are_validated() {
    let fx = Fixture::new();
    let repo = fx.init("alice");
    for bad in ["", "has space", "a..b", "/lead", "trail/", ".hidden"] {
        assert!(
            matches!(repo.create_branch(bad, None), Err(VersionError::InvalidBranchName { .. })),
            "{bad:?} should be rejected"
        );
    }
    assert!(matches!(repo.create_branch("main", None), Err(VersionError::BranchExists(_))));
    repo.create_branch("release/1.0", None).unwrap();
}

#[test]
fn test_log_walks_history_newest_first() {
    let fx = Fixture::new();
    let mut repo = fx.init("alice");
    assert!(repo.log(None).unwrap().is_empty());

    fx.commit_files(&mut repo, "main", &[("a.txt", "1")], "one");
    fx.commit_files(&mut repo, "main", &[("a.txt", "2")], "two");
    let three = fx.commit_files(&mut repo, "main", &[("a.txt", "3")], "three");

    repo.checkout(CheckoutMode::Branch, "main").unwrap();
    let messages: Vec<String> = repo.log(None).unwrap().into_iter().map(|c| c.message).collect();
    assert_eq!(messages, vec!["three", "two", "one"]);
    assert_eq!(repo.log(Some(1)).unwrap()[0].hash, three.hash);

    let first = repo.resolve_commit("main").unwrap();
    assert_eq!(first.hash, three.hash);
    let diff = repo
        .diff_commits(&repo.log(None).unwrap()[2].hash, &three.hash)
        .unwrap();
    assert_eq!(diff.num(), 1);
}
