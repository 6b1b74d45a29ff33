//! Integration tests for commit graph traversal and merge-base resolution

use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use versa::graph::{
    is_ancestor, merge_bases, BfsIter, CommitIter, CommitNode, CtimeIter, FilteredBfsIter, PostorderIter,
    PreorderIter,
};
use versa::store::{CommitRepo, KvStore};
use versa::types::Signature;
use versa::{Cancellation, Commit, Hash, TreeNode};
use uuid::Uuid;

struct Graph {
    store: KvStore,
    repo: Uuid,
    clock: i64,
    names: HashMap<Hash, String>,
}

impl Graph {
    fn new() -> Self {
        Self {
            store: KvStore::memory(),
            repo: Uuid::new_v4(),
            clock: 1_600_000_000,
            names: HashMap::new(),
        }
    }

    fn commit(&mut self, name: &str, parents: &[Hash]) -> Hash {
        self.clock += 3600;
        let sig = Signature::new("graph", "graph@example.com", Utc.timestamp_opt(self.clock, 0).unwrap());
        let commit = Commit::new(self.repo, sig.clone(), sig, name, TreeNode::empty_hash(), parents.to_vec());
        self.store.insert_commit(&commit).unwrap();
        self.names.insert(commit.hash, name.to_string());
        commit.hash
    }

    fn node(&self, hash: &Hash) -> CommitNode<'_> {
        CommitNode::load(&self.store, self.repo, hash).unwrap()
    }

    fn names(&self, hashes: &[Hash]) -> Vec<String> {
        hashes.iter().map(|h| self.names[h].clone()).collect()
    }
}

/// root -> (left, right) -> merge
fn diamond(g: &mut Graph) -> [Hash; 4] {
    let root = g.commit("root", &[]);
    let left = g.commit("left", &[root]);
    let right = g.commit("right", &[root]);
    let merge = g.commit("merge", &[left, right]);
    [root, left, right, merge]
}

#[test]
fn test_every_strategy_visits_shared_ancestor_once() {
    let mut g = Graph::new();
    let [root, _, _, merge] = diamond(&mut g);

    let walks: Vec<(&str, Vec<Hash>)> = vec![
        ("bfs", BfsIter::new(g.node(&merge), &[]).hashes().unwrap()),
        ("preorder", PreorderIter::new(g.node(&merge), &[]).hashes().unwrap()),
        ("postorder", PostorderIter::new(g.node(&merge), &[]).hashes().unwrap()),
        ("ctime", CtimeIter::new(g.node(&merge), &[]).hashes().unwrap()),
        (
            "filtered",
            FilteredBfsIter::new(g.node(&merge), &[], |_| true, |_| false)
                .hashes()
                .unwrap(),
        ),
    ];

    for (strategy, hashes) in walks {
        assert_eq!(hashes.len(), 4, "{strategy} visited {:?}", g.names(&hashes));
        assert_eq!(
            hashes.iter().filter(|h| **h == root).count(),
            1,
            "{strategy} must visit root exactly once"
        );
    }
}

#[test]
fn test_postorder_yields_parents_before_children() {
    let mut g = Graph::new();
    let a = g.commit("a", &[]);
    let b = g.commit("b", &[a]);
    let c = g.commit("c", &[a]);
    let d = g.commit("d", &[b, c]);
    let e = g.commit("e", &[d, c]);

    let order = PostorderIter::new(g.node(&e), &[]).hashes().unwrap();
    let position: HashMap<Hash, usize> = order.iter().enumerate().map(|(i, h)| (*h, i)).collect();
    for hash in &order {
        let commit = g.store.get_commit(g.repo, hash).unwrap().unwrap();
        for parent in &commit.parent_hashes {
            assert!(position[parent] < position[hash]);
        }
    }
    assert_eq!(g.names(&order).last().unwrap(), "e");
}

#[test]
fn test_ctime_order_is_newest_first() {
    let mut g = Graph::new();
    let [_, _, _, merge] = diamond(&mut g);
    let order = CtimeIter::new(g.node(&merge), &[]).hashes().unwrap();
    assert_eq!(g.names(&order), vec!["merge", "right", "left", "root"]);
}

#[test]
fn test_ignored_commits_cut_the_walk() {
    let mut g = Graph::new();
    let a = g.commit("a", &[]);
    let b = g.commit("b", &[a]);
    let c = g.commit("c", &[b]);

    let hashes = BfsIter::new(g.node(&c), &[b]).hashes().unwrap();
    assert_eq!(g.names(&hashes), vec!["c"]);
}

#[test]
fn test_merge_bases_of_branches() {
    let mut g = Graph::new();
    let cancel = Cancellation::new();
    let base = g.commit("base", &[]);
    let ours = g.commit("ours", &[base]);
    let theirs = g.commit("theirs", &[base]);
    let unrelated = g.commit("unrelated", &[]);

    let bases = merge_bases(&g.store, g.repo, &ours, &theirs, &cancel).unwrap();
    assert_eq!(bases.iter().map(|c| c.hash).collect::<Vec<_>>(), vec![base]);

    assert!(is_ancestor(&g.store, g.repo, &base, &ours, &cancel).unwrap());
    assert!(!is_ancestor(&g.store, g.repo, &ours, &theirs, &cancel).unwrap());
    assert!(merge_bases(&g.store, g.repo, &ours, &unrelated, &cancel).unwrap().is_empty());
}

#[test]
fn test_criss_cross_has_two_merge_bases() {
    let mut g = Graph::new();
    let cancel = Cancellation::new();
    let base = g.commit("base", &[]);
    let x = g.commit("x", &[base]);
    let y = g.commit("y", &[base]);
    let mx = g.commit("mx", &[x, y]);
    let my = g.commit("my", &[y, x]);

    let bases = merge_bases(&g.store, g.repo, &mx, &my, &cancel).unwrap();
    let mut names: Vec<String> = bases.iter().map(|c| c.message.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["x", "y"]);
}
