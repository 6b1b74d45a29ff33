//! Work Repository
//!
//! One caller's view of one repository. A checkout puts the instance in one
//! of three states and caches the resolved records plus the head tree:
//!
//! - `InWip`: editing the operator's wip on a branch
//! - `InBranch`: at a branch head, ready to commit or merge
//! - `InCommit`: read-only view of a single commit
//!
//! Branch-advancing operations (`commit_changes`, `merge`, `delete_branch`)
//! each run inside one storage transaction. So do wip writes, which refuse
//! to overwrite a stored wip that moved under the cached copy.

pub mod refname;

pub use refname::validate_branch_name;

use crate::cancel::Cancellation;
use crate::diff::{diff_trees, Changes};
use crate::error::{StorageError, VersionError};
use crate::graph::{CommitIter, CommitNode, CtimeIter};
use crate::merge::{three_way_merge_trees, ConflictResolver, MergeOutcome, Merger, DEFAULT_MAX_RECURSION_DEPTH};
use crate::object::{Blob, Branch, Commit, TreeEntry, TreeNode, WorkingInProcess};
use crate::store::Repo;
use crate::tree::WorkTree;
use crate::types::{Hash, Operator};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// What a checkout reference names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// The operator's wip on the named branch.
    Wip,
    Branch,
    /// A commit fingerprint in hex.
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    InWip,
    InBranch,
    InCommit,
}

impl fmt::Display for RepoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepoState::InWip => "InWip",
            RepoState::InBranch => "InBranch",
            RepoState::InCommit => "InCommit",
        };
        f.write_str(s)
    }
}

/// A resolved checkout target and its root tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkout {
    Wip {
        tree: Hash,
        branch: Branch,
        wip: WorkingInProcess,
    },
    Branch {
        tree: Hash,
        branch: Branch,
        /// `None` while the branch is unborn.
        commit: Option<Commit>,
    },
    Commit {
        tree: Hash,
        commit: Commit,
    },
}

impl Checkout {
    pub fn tree(&self) -> Hash {
        match self {
            Checkout::Wip { tree, .. } | Checkout::Branch { tree, .. } | Checkout::Commit { tree, .. } => *tree,
        }
    }

    pub fn state(&self) -> RepoState {
        match self {
            Checkout::Wip { .. } => RepoState::InWip,
            Checkout::Branch { .. } => RepoState::InBranch,
            Checkout::Commit { .. } => RepoState::InCommit,
        }
    }

    pub fn branch(&self) -> Option<&Branch> {
        match self {
            Checkout::Wip { branch, .. } | Checkout::Branch { branch, .. } => Some(branch),
            Checkout::Commit { .. } => None,
        }
    }

    /// Commit the view starts from: the branch head or the checked-out commit.
    fn head(&self) -> Option<Hash> {
        match self {
            Checkout::Wip { branch, .. } | Checkout::Branch { branch, .. } => branch.head,
            Checkout::Commit { commit, .. } => Some(commit.hash),
        }
    }
}

fn state_name(checkout: Option<&Checkout>) -> String {
    checkout.map_or_else(|| "none".to_string(), |c| c.state().to_string())
}

fn load_commit(store: &dyn Repo, repository_id: Uuid, hash: &Hash) -> Result<Commit, VersionError> {
    store
        .get_commit(repository_id, hash)?
        .ok_or_else(|| VersionError::not_found("commit", hash))
}

fn load_branch(store: &dyn Repo, repository_id: Uuid, name: &str) -> Result<Branch, VersionError> {
    store
        .get_branch(repository_id, name)?
        .ok_or_else(|| VersionError::not_found("branch", name))
}

/// Root tree of a commit, or the empty root for an unborn head.
fn commit_tree(store: &dyn Repo, repository_id: Uuid, head: Option<&Hash>) -> Result<Hash, VersionError> {
    match head {
        Some(hash) => Ok(load_commit(store, repository_id, hash)?.tree_hash),
        None => Ok(TreeNode::empty_hash()),
    }
}

pub struct WorkRepository {
    store: Arc<dyn Repo>,
    repository_id: Uuid,
    operator: Operator,
    cancel: Cancellation,
    max_merge_depth: usize,
    checkout: Option<Checkout>,
}

impl WorkRepository {
    pub fn new(store: Arc<dyn Repo>, repository_id: Uuid, operator: Operator) -> Self {
        Self {
            store,
            repository_id,
            operator,
            cancel: Cancellation::new(),
            max_merge_depth: DEFAULT_MAX_RECURSION_DEPTH,
            checkout: None,
        }
    }

    /// Set up a repository with an unborn default branch and check it out.
    pub fn init(
        store: Arc<dyn Repo>,
        repository_id: Uuid,
        operator: Operator,
        default_branch: &str,
    ) -> Result<Self, VersionError> {
        let mut repo = Self::new(store, repository_id, operator);
        repo.store.insert_tree_node(&TreeNode::empty(repository_id))?;
        repo.create_branch(default_branch, None)?;
        repo.checkout(CheckoutMode::Branch, default_branch)?;
        info!(repository = %repository_id, branch = default_branch, "Initialized repository");
        Ok(repo)
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_merge_depth(mut self, depth: usize) -> Self {
        self.max_merge_depth = depth;
        self
    }

    pub fn repository_id(&self) -> Uuid {
        self.repository_id
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn store(&self) -> &Arc<dyn Repo> {
        &self.store
    }

    pub fn state(&self) -> Option<RepoState> {
        self.checkout.as_ref().map(Checkout::state)
    }

    pub fn current(&self) -> Option<&Checkout> {
        self.checkout.as_ref()
    }

    /// Cached head tree of the current checkout.
    pub fn current_tree(&self) -> Option<Hash> {
        self.checkout.as_ref().map(Checkout::tree)
    }

    pub fn current_branch(&self) -> Option<&Branch> {
        self.checkout.as_ref().and_then(Checkout::branch)
    }

    pub fn current_wip(&self) -> Option<&WorkingInProcess> {
        match &self.checkout {
            Some(Checkout::Wip { wip, .. }) => Some(wip),
            _ => None,
        }
    }

    /// Drop every cached record; the next checkout re-reads storage.
    pub fn reset(&mut self) {
        self.checkout = None;
    }

    fn invalid_state(&self, operation: &'static str, expected: &'static str) -> VersionError {
        VersionError::InvalidState {
            operation,
            expected,
            actual: state_name(self.checkout.as_ref()),
        }
    }

    fn require_branch(&self, operation: &'static str) -> Result<&Branch, VersionError> {
        match &self.checkout {
            Some(Checkout::Branch { branch, .. }) => Ok(branch),
            _ => Err(self.invalid_state(operation, "InBranch")),
        }
    }

    fn require_wip(&self, operation: &'static str) -> Result<(&Branch, &WorkingInProcess), VersionError> {
        match &self.checkout {
            Some(Checkout::Wip { branch, wip, .. }) => Ok((branch, wip)),
            _ => Err(self.invalid_state(operation, "InWip")),
        }
    }

    /// Resolve a reference and cache the result.
    #[instrument(skip(self), fields(repository = %self.repository_id))]
    pub fn checkout(&mut self, mode: CheckoutMode, reference: &str) -> Result<&Checkout, VersionError> {
        let store = self.store.as_ref();
        let checkout = match mode {
            CheckoutMode::Wip => {
                let branch = load_branch(store, self.repository_id, reference)?;
                let wip = store
                    .get_wip(self.repository_id, branch.id, &self.operator.name)?
                    .ok_or_else(|| VersionError::not_found("wip", format!("{}@{}", self.operator.name, reference)))?;
                Checkout::Wip {
                    tree: wip.current_tree,
                    branch,
                    wip,
                }
            }
            CheckoutMode::Branch => {
                let branch = load_branch(store, self.repository_id, reference)?;
                let commit = match &branch.head {
                    Some(head) => Some(load_commit(store, self.repository_id, head)?),
                    None => None,
                };
                Checkout::Branch {
                    tree: commit.as_ref().map_or_else(TreeNode::empty_hash, |c| c.tree_hash),
                    branch,
                    commit,
                }
            }
            CheckoutMode::Commit => {
                let hash = Hash::from_hex(reference)?;
                let commit = load_commit(store, self.repository_id, &hash)?;
                Checkout::Commit {
                    tree: commit.tree_hash,
                    commit,
                }
            }
        };
        debug!(state = %checkout.state(), tree = %checkout.tree().short(), "Checked out");
        Ok(self.checkout.insert(checkout))
    }

    /// Resolve a branch name or a commit fingerprint to a commit.
    pub fn resolve_commit(&self, reference: &str) -> Result<Commit, VersionError> {
        let store = self.store.as_ref();
        if let Some(branch) = store.get_branch(self.repository_id, reference)? {
            let head = branch
                .head
                .ok_or_else(|| VersionError::not_found("commit", format!("head of unborn branch {reference}")))?;
            return load_commit(store, self.repository_id, &head);
        }
        let hash = Hash::from_hex(reference)?;
        load_commit(store, self.repository_id, &hash)
    }

    /// The operator's wip on the checked-out branch, created at the branch
    /// head's tree if missing. Switches to `InWip`.
    pub fn get_or_create_wip(&mut self) -> Result<WorkingInProcess, VersionError> {
        let branch = self.require_branch("get_or_create_wip")?.clone();
        let tree = self.current_tree().unwrap_or_else(TreeNode::empty_hash);
        let creator = self.operator.name.as_str();

        let mut created = false;
        let mut result = None;
        self.store.run_in_transaction(&mut |txn: &dyn Repo| {
            let wip = match txn.get_wip(self.repository_id, branch.id, creator)? {
                Some(wip) => wip,
                None => {
                    let wip = WorkingInProcess::new(&branch, creator, tree);
                    txn.insert_wip(&wip)?;
                    created = true;
                    wip
                }
            };
            result = Some(wip);
            Ok(())
        })?;

        let wip = result.ok_or_else(|| VersionError::not_found("wip", creator))?;
        if created {
            info!(branch = %branch.name, creator, "Created wip");
        }
        self.checkout = Some(Checkout::Wip {
            tree: wip.current_tree,
            branch,
            wip: wip.clone(),
        });
        Ok(wip)
    }

    /// Apply `update` to the stored wip in one transaction.
    ///
    /// Fails with `StaleWip` and writes nothing when the stored record has
    /// moved since this instance cached it; `rebase_wip` reloads it.
    fn update_cached_wip<F>(&mut self, operation: &'static str, update: F) -> Result<WorkingInProcess, VersionError>
    where
        F: FnOnce(&dyn Repo, &mut WorkingInProcess) -> Result<(), VersionError>,
    {
        let (branch, cached) = self.require_wip(operation)?;
        let (branch, cached) = (branch.clone(), cached.clone());

        let mut update = Some(update);
        let mut result = None;
        self.store.run_in_transaction(&mut |txn: &dyn Repo| {
            let mut wip = txn
                .get_wip(self.repository_id, cached.branch_id, &cached.creator)?
                .ok_or_else(|| VersionError::not_found("wip", &cached.creator))?;
            if wip.base_commit != cached.base_commit || wip.current_tree != cached.current_tree {
                let head = load_branch(txn, self.repository_id, &branch.name)?.head;
                return Err(VersionError::StaleWip {
                    base: cached.base_commit,
                    head,
                });
            }
            let update = update.take().ok_or_else(|| self.invalid_state(operation, "InWip"))?;
            update(txn, &mut wip)?;
            wip.updated_at = Utc::now();
            txn.update_wip(&wip)?;
            result = Some(wip);
            Ok(())
        })?;

        let wip = result.ok_or_else(|| VersionError::not_found("wip", &cached.creator))?;
        self.checkout = Some(Checkout::Wip {
            tree: wip.current_tree,
            branch,
            wip: wip.clone(),
        });
        Ok(wip)
    }

    /// Run an edit against the wip tree and persist the new root.
    pub fn change_wip_tree<F>(&mut self, edit: F) -> Result<Hash, VersionError>
    where
        F: FnOnce(&mut WorkTree<'_>) -> Result<Hash, VersionError>,
    {
        let repository_id = self.repository_id;
        let wip = self.update_cached_wip("change_wip_tree", |txn, wip| {
            let mut tree = WorkTree::new(txn.objects(), repository_id, wip.current_tree);
            wip.current_tree = edit(&mut tree)?;
            Ok(())
        })?;
        Ok(wip.current_tree)
    }

    pub fn add_leaf(&mut self, path: &str, blob: &Blob) -> Result<Hash, VersionError> {
        self.change_wip_tree(|tree| tree.add_leaf(path, blob))
    }

    pub fn replace_leaf(&mut self, path: &str, blob: &Blob) -> Result<Hash, VersionError> {
        self.change_wip_tree(|tree| tree.replace_leaf(path, blob))
    }

    pub fn remove_entry(&mut self, path: &str) -> Result<Hash, VersionError> {
        self.change_wip_tree(|tree| tree.remove_entry(path))
    }

    fn read_tree(&self, operation: &'static str) -> Result<WorkTree<'_>, VersionError> {
        let tree = self
            .current_tree()
            .ok_or_else(|| self.invalid_state(operation, "InWip, InBranch or InCommit"))?;
        Ok(WorkTree::new(self.store.objects(), self.repository_id, tree))
    }

    /// Entries of a directory in the checked-out tree.
    pub fn ls(&self, path: &str) -> Result<Vec<TreeEntry>, VersionError> {
        self.read_tree("ls")?.ls(path)
    }

    pub fn find_blob(&self, path: &str) -> Result<Blob, VersionError> {
        self.read_tree("find_blob")?.find_blob(path)
    }

    /// Every file in the checked-out tree.
    pub fn walk_leaves(&self, prefix: &str) -> Result<Vec<(String, TreeEntry)>, VersionError> {
        self.read_tree("walk_leaves")?.walk_leaves(prefix)
    }

    /// Pending changes of the wip relative to its base commit.
    pub fn status(&self) -> Result<Changes, VersionError> {
        let (_, wip) = self.require_wip("status")?;
        let store = self.store.as_ref();
        let base = commit_tree(store, self.repository_id, wip.base_commit.as_ref())?;
        diff_trees(store.objects(), self.repository_id, &base, &wip.current_tree, &self.cancel)
    }

    /// Throw away pending edits.
    pub fn revert_wip(&mut self) -> Result<WorkingInProcess, VersionError> {
        let repository_id = self.repository_id;
        let wip = self.update_cached_wip("revert_wip", |txn, wip| {
            wip.current_tree = commit_tree(txn, repository_id, wip.base_commit.as_ref())?;
            Ok(())
        })?;
        debug!(branch_id = %wip.branch_id, "Reverted wip");
        Ok(wip)
    }

    /// Delete the wip and fall back to the branch.
    pub fn delete_wip(&mut self) -> Result<(), VersionError> {
        let (branch, wip) = self.require_wip("delete_wip")?;
        let (name, creator, branch_id) = (branch.name.clone(), wip.creator.clone(), wip.branch_id);
        self.store.delete_wip(self.repository_id, branch_id, &creator)?;
        info!(branch = %name, creator = %creator, "Deleted wip");
        self.checkout(CheckoutMode::Branch, &name)?;
        Ok(())
    }

    /// Commit the wip tree onto its branch.
    ///
    /// Rejects a wip whose base commit is no longer the branch head, and a
    /// cached wip that is behind its stored record. The commit insert, the
    /// wip base advance and the branch head advance happen in one
    /// transaction.
    #[instrument(skip(self, message), fields(repository = %self.repository_id))]
    pub fn commit_changes(&mut self, message: &str) -> Result<Commit, VersionError> {
        let (branch_name, cached_base) = match &self.checkout {
            Some(Checkout::Wip { branch, wip, .. }) => (branch.name.clone(), Some(wip.base_commit)),
            Some(Checkout::Branch { branch, .. }) => (branch.name.clone(), None),
            _ => return Err(self.invalid_state("commit_changes", "InWip or InBranch")),
        };

        let mut result: Option<(Commit, Branch, WorkingInProcess)> = None;
        self.store.run_in_transaction(&mut |txn: &dyn Repo| {
            let branch = load_branch(txn, self.repository_id, &branch_name)?;
            let mut wip = txn
                .get_wip(self.repository_id, branch.id, &self.operator.name)?
                .ok_or_else(|| VersionError::not_found("wip", format!("{}@{}", self.operator.name, branch_name)))?;

            if let Some(cached) = cached_base {
                if cached != wip.base_commit {
                    return Err(VersionError::StaleWip {
                        base: cached,
                        head: branch.head,
                    });
                }
            }
            if wip.base_commit != branch.head {
                return Err(VersionError::StaleWip {
                    base: wip.base_commit,
                    head: branch.head,
                });
            }

            let signature = self.operator.signature();
            let commit = Commit::new(
                self.repository_id,
                signature.clone(),
                signature,
                message,
                wip.current_tree,
                branch.head.into_iter().collect(),
            );
            txn.insert_commit(&commit)?;

            wip.base_commit = Some(commit.hash);
            wip.updated_at = Utc::now();
            txn.update_wip(&wip)?;

            let branch = txn.update_branch_head(self.repository_id, &branch_name, Some(commit.hash))?;
            result = Some((commit, branch, wip));
            Ok(())
        })?;

        let (commit, branch, wip) = result.ok_or_else(|| VersionError::not_found("commit", &branch_name))?;
        info!(branch = %branch_name, commit = %commit.hash.short(), "Advanced branch");

        self.checkout = Some(match self.checkout.as_ref().map(Checkout::state) {
            Some(RepoState::InWip) => Checkout::Wip {
                tree: wip.current_tree,
                branch,
                wip,
            },
            _ => Checkout::Branch {
                tree: commit.tree_hash,
                branch,
                commit: Some(commit.clone()),
            },
        });
        Ok(commit)
    }

    /// Merge `target` into the checked-out branch and advance its head.
    #[instrument(skip(self, merger, target, message, resolver), fields(repository = %self.repository_id, incoming = %target.short()))]
    pub fn merge(
        &mut self,
        merger: &Operator,
        target: &Hash,
        message: &str,
        resolver: &dyn ConflictResolver,
    ) -> Result<MergeOutcome, VersionError> {
        let branch_name = self.require_branch("merge")?.name.clone();

        let mut result: Option<(MergeOutcome, Branch)> = None;
        self.store.run_in_transaction(&mut |txn: &dyn Repo| {
            let branch = load_branch(txn, self.repository_id, &branch_name)?;
            let outcome = match &branch.head {
                None => MergeOutcome::FastForward(load_commit(txn, self.repository_id, target)?),
                Some(head) => Merger::new(txn, self.repository_id, resolver)
                    .with_cancellation(self.cancel.clone())
                    .with_max_depth(self.max_merge_depth)
                    .merge(head, target, merger, message)?,
            };
            let branch = match &outcome {
                MergeOutcome::UpToDate(_) => branch,
                MergeOutcome::FastForward(c) | MergeOutcome::Merged(c) => {
                    txn.update_branch_head(self.repository_id, &branch_name, Some(c.hash))?
                }
            };
            result = Some((outcome, branch));
            Ok(())
        })?;

        let (outcome, branch) = result.ok_or_else(|| VersionError::not_found("branch", &branch_name))?;
        let commit = outcome.commit().clone();
        info!(branch = %branch_name, head = %commit.hash.short(), outcome = outcome.kind(), "Merged into branch");
        self.checkout = Some(Checkout::Branch {
            tree: commit.tree_hash,
            branch,
            commit: Some(commit),
        });
        Ok(outcome)
    }

    /// Replay the wip's pending edits onto the current branch head.
    ///
    /// This is how a wip rejected with `StaleWip` is brought up to date.
    pub fn rebase_wip(&mut self, resolver: &dyn ConflictResolver) -> Result<WorkingInProcess, VersionError> {
        let branch_name = self.require_wip("rebase_wip")?.0.name.clone();

        let mut result: Option<(Branch, WorkingInProcess)> = None;
        self.store.run_in_transaction(&mut |txn: &dyn Repo| {
            let branch = load_branch(txn, self.repository_id, &branch_name)?;
            let mut wip = txn
                .get_wip(self.repository_id, branch.id, &self.operator.name)?
                .ok_or_else(|| VersionError::not_found("wip", &self.operator.name))?;

            if wip.base_commit != branch.head {
                let base = commit_tree(txn, self.repository_id, wip.base_commit.as_ref())?;
                let head = commit_tree(txn, self.repository_id, branch.head.as_ref())?;
                wip.current_tree = three_way_merge_trees(
                    txn.objects(),
                    self.repository_id,
                    &base,
                    &head,
                    &wip.current_tree,
                    resolver,
                    &self.cancel,
                )?;
                wip.base_commit = branch.head;
                wip.updated_at = Utc::now();
                txn.update_wip(&wip)?;
            }
            result = Some((branch, wip));
            Ok(())
        })?;

        let (branch, wip) = result.ok_or_else(|| VersionError::not_found("wip", &self.operator.name))?;
        debug!(branch = %branch.name, base = ?wip.base_commit, "Rebased wip");
        self.checkout = Some(Checkout::Wip {
            tree: wip.current_tree,
            branch,
            wip: wip.clone(),
        });
        Ok(wip)
    }

    /// Create a branch pointing at `head` (`None` for unborn).
    pub fn create_branch(&self, name: &str, head: Option<Hash>) -> Result<Branch, VersionError> {
        validate_branch_name(name)?;
        if let Some(hash) = &head {
            load_commit(self.store.as_ref(), self.repository_id, hash)?;
        }

        let branch = Branch::new(self.repository_id, name, head, self.operator.name.clone());
        self.store.run_in_transaction(&mut |txn: &dyn Repo| {
            if txn.get_branch(self.repository_id, name)?.is_some() {
                return Err(VersionError::BranchExists(name.to_string()));
            }
            txn.insert_branch(&branch).map_err(|err| match err {
                StorageError::AlreadyExists { .. } => VersionError::BranchExists(name.to_string()),
                other => other.into(),
            })
        })?;
        info!(branch = name, head = ?head, "Created branch");
        Ok(branch)
    }

    /// Delete a branch and every wip anchored to it.
    pub fn delete_branch(&mut self, name: &str) -> Result<(), VersionError> {
        let mut removed_wips = 0;
        self.store.run_in_transaction(&mut |txn: &dyn Repo| {
            let branch = load_branch(txn, self.repository_id, name)?;
            removed_wips = txn.delete_wips_for_branch(self.repository_id, branch.id)?;
            txn.delete_branch(self.repository_id, name)?;
            Ok(())
        })?;
        info!(branch = name, removed_wips, "Deleted branch");

        if self.current_branch().is_some_and(|b| b.name == name) {
            self.reset();
        }
        Ok(())
    }

    pub fn list_branches(&self) -> Result<Vec<Branch>, VersionError> {
        let mut branches = self.store.list_branches(self.repository_id)?;
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    /// History from the current head, newest committer time first.
    pub fn log(&self, limit: Option<usize>) -> Result<Vec<Commit>, VersionError> {
        let head = match &self.checkout {
            Some(checkout) => checkout.head(),
            None => return Err(self.invalid_state("log", "InWip, InBranch or InCommit")),
        };
        let Some(head) = head else {
            return Ok(Vec::new());
        };

        let start = CommitNode::load(self.store.commits(), self.repository_id, &head)?;
        let mut iter = CtimeIter::new(start, &[]).with_cancellation(self.cancel.clone());
        let mut out = Vec::new();
        while limit.map_or(true, |n| out.len() < n) {
            match iter.next_commit()? {
                Some(node) => out.push(node.into_commit()),
                None => break,
            }
        }
        Ok(out)
    }

    /// Changes between the trees of two commits.
    pub fn diff_commits(&self, from: &Hash, to: &Hash) -> Result<Changes, VersionError> {
        let store = self.store.as_ref();
        let from_tree = load_commit(store, self.repository_id, from)?.tree_hash;
        let to_tree = load_commit(store, self.repository_id, to)?.tree_hash;
        diff_trees(store.objects(), self.repository_id, &from_tree, &to_tree, &self.cancel)
    }
}
