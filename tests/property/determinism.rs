//! Property-based tests for fingerprint determinism

use proptest::prelude::*;
use uuid::Uuid;
use versa::object::hasher;
use versa::types::Hash;
use versa::{TreeEntry, TreeNode};

fn entries_from(names: &[String]) -> Vec<TreeEntry> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let hash = hasher::compute_content_hash(name.as_bytes());
            if i % 2 == 0 {
                TreeEntry::leaf(name.clone(), hash)
            } else {
                TreeEntry::dir(name.clone(), hash)
            }
        })
        .collect()
}

/// Content fingerprints depend only on the bytes
#[test]
fn test_content_hash_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(any::<Vec<u8>>(), any::<Vec<u8>>()), |(content1, content2)| {
            let hash1 = hasher::compute_content_hash(&content1);
            let hash2 = hasher::compute_content_hash(&content2);

            if content1 == content2 {
                assert_eq!(hash1, hash2);
            } else {
                prop_assume!(hash1 != hash2);
            }
            assert_eq!(Hash::from_hex(&hash1.to_hex()).unwrap(), hash1);

            Ok(())
        })
        .unwrap();
}

/// Tree fingerprints ignore the order entries were supplied in
#[test]
fn test_tree_hash_ignores_entry_order() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let names = proptest::collection::btree_set("[a-z0-9_.]{1,8}", 1..16)
        .prop_map(|set| set.into_iter().collect::<Vec<String>>());
    let strategy = names.prop_flat_map(|sorted| {
        let shuffled = Just(sorted.clone()).prop_shuffle();
        (Just(sorted), shuffled)
    });

    runner
        .run(&strategy, |(sorted, shuffled)| {
            let repository_id = Uuid::new_v4();
            let entries = entries_from(&sorted);
            let mut reordered = Vec::new();
            for name in &shuffled {
                let pos = sorted.iter().position(|n| n == name).unwrap();
                reordered.push(entries[pos].clone());
            }

            let a = TreeNode::new(repository_id, entries).unwrap();
            let b = TreeNode::new(Uuid::new_v4(), reordered).unwrap();

            assert_eq!(a.hash, b.hash);
            assert_eq!(a.entries(), b.entries());
            assert!(a.verify());

            Ok(())
        })
        .unwrap();
}

/// A single changed child changes the parent fingerprint
#[test]
fn test_tree_hash_tracks_child_changes() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(any::<[u8; 32]>(), any::<[u8; 32]>()), |(left, right)| {
            prop_assume!(left != right);
            let repository_id = Uuid::new_v4();
            let a = TreeNode::new(
                repository_id,
                vec![TreeEntry::leaf("data.csv", Hash::from_bytes(left))],
            )
            .unwrap();
            let b = TreeNode::new(
                repository_id,
                vec![TreeEntry::leaf("data.csv", Hash::from_bytes(right))],
            )
            .unwrap();

            assert_ne!(a.hash, b.hash);
            assert_ne!(a.hash, TreeNode::empty_hash());

            Ok(())
        })
        .unwrap();
}
