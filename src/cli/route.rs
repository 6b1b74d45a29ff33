//! CLI route: single route table and run context. Dispatches to the work
//! repository and presentation.

use crate::block::{read_blob, write_blob, BlockAdapter, LocalAdapter, MemoryAdapter};
use crate::cli::parse::{BranchCommands, Commands, Strategy};
use crate::cli::presentation::{format_branches, format_changes, format_entries, format_leaves, format_log};
use crate::cli::state::{RepositoryEntry, WorkspaceState};
use crate::config::{ConfigLoader, StorageBackend, VersaConfig};
use crate::error::{StorageError, VersionError};
use crate::merge::{ConflictResolver, LeftResolver, LowestHashResolver, RightResolver, StrictResolver};
use crate::repo::{CheckoutMode, WorkRepository};
use crate::store::{KvStore, Repo};
use crate::types::{Operator, Properties};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

fn resolver_for(strategy: Strategy) -> Box<dyn ConflictResolver> {
    match strategy {
        Strategy::Lowest => Box::new(LowestHashResolver),
        Strategy::Ours => Box::new(LeftResolver),
        Strategy::Theirs => Box::new(RightResolver),
        Strategy::Strict => Box::new(StrictResolver),
    }
}

/// Operator from the explicit user, then `$VERSA_USER`, then `$USER`.
pub(crate) fn resolve_operator(user: Option<String>) -> Operator {
    let name = user
        .or_else(|| std::env::var("VERSA_USER").ok())
        .or_else(|| std::env::var("USER").ok())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "anonymous".to_string());
    let email = std::env::var("VERSA_EMAIL").unwrap_or_else(|_| format!("{}@localhost", name));
    Operator::new(name, email)
}

/// Runtime context for CLI execution: workspace, config and the opened store.
pub struct RunContext {
    store: Arc<KvStore>,
    blocks: Arc<dyn BlockAdapter>,
    config: VersaConfig,
    state_path: PathBuf,
    repo_name: String,
    operator: Operator,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        repo_name: String,
        user: Option<String>,
    ) -> Result<Self, VersionError> {
        let config = match &config_path {
            Some(path) => {
                let mut config = ConfigLoader::load_from_file(path)?;
                config.resolve_paths(&workspace_root);
                config
            }
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(config, &workspace_root, repo_name, resolve_operator(user))
    }

    /// Open the configured store and block adapter.
    pub fn with_config(
        config: VersaConfig,
        workspace_root: &Path,
        repo_name: String,
        operator: Operator,
    ) -> Result<Self, VersionError> {
        let (store, blocks): (Arc<KvStore>, Arc<dyn BlockAdapter>) = match config.storage.backend {
            StorageBackend::Sled => {
                std::fs::create_dir_all(&config.storage.path).map_err(StorageError::from)?;
                (
                    Arc::new(KvStore::open_sled(&config.storage.path)?),
                    Arc::new(LocalAdapter::new(&config.blocks.root)?),
                )
            }
            StorageBackend::Memory => (Arc::new(KvStore::memory()), Arc::new(MemoryAdapter::new())),
        };
        debug!(backend = ?config.storage.backend, repo = %repo_name, user = %operator.name, "Opened store");

        Ok(Self {
            store,
            blocks,
            config,
            state_path: WorkspaceState::path(workspace_root),
            repo_name,
            operator,
        })
    }

    pub fn config(&self) -> &VersaConfig {
        &self.config
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Execute a CLI command via the single route table, then flush the store.
    pub fn execute(&self, command: &Commands) -> Result<String, VersionError> {
        let output = self.execute_inner(command)?;
        self.store.flush()?;
        Ok(output)
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, VersionError> {
        let mut state = WorkspaceState::load(&self.state_path)?;
        match command {
            Commands::Init { branch } => self.handle_init(&mut state, branch),
            Commands::Branch { command } => self.handle_branch_command(&state, command),
            Commands::Checkout { branch } => {
                let (mut repo, _) = self.open(&state)?;
                repo.checkout(CheckoutMode::Branch, branch)?;
                if let Some(entry) = state.repositories.get_mut(&self.repo_name) {
                    entry.branch = branch.clone();
                }
                state.save(&self.state_path)?;
                Ok(format!("Switched to branch {}", branch))
            }
            Commands::Add { path, file, executable } => {
                let blob = self.store_file(&state, file, *executable)?;
                let mut repo = self.open_wip(&state)?;
                repo.add_leaf(path, &blob)?;
                Ok(format!("added {} ({})", path, blob.hash.short()))
            }
            Commands::Replace { path, file, executable } => {
                let blob = self.store_file(&state, file, *executable)?;
                let mut repo = self.open_wip(&state)?;
                repo.replace_leaf(path, &blob)?;
                Ok(format!("replaced {} ({})", path, blob.hash.short()))
            }
            Commands::Rm { path } => {
                let mut repo = self.open_wip(&state)?;
                repo.remove_entry(path)?;
                Ok(format!("removed {}", path))
            }
            Commands::Ls { path, recursive } => {
                let repo = self.open_view(&state)?;
                if *recursive {
                    Ok(format_leaves(&repo.walk_leaves(path)?))
                } else {
                    Ok(format_entries(&repo.ls(path)?))
                }
            }
            Commands::Cat { path } => {
                let repo = self.open_view(&state)?;
                let blob = repo.find_blob(path)?;
                let data = read_blob(self.blocks.as_ref(), &blob)?;
                Ok(String::from_utf8_lossy(&data).into_owned())
            }
            Commands::Status { format } => {
                let (mut repo, branch) = self.open(&state)?;
                match repo.checkout(CheckoutMode::Wip, &branch).map(|_| ()) {
                    Ok(_) => format_changes(&repo.status()?, format),
                    Err(VersionError::NotFound { kind: "wip", .. }) => Ok(format!("On branch {}, no wip", branch)),
                    Err(e) => Err(e),
                }
            }
            Commands::Commit { message } => {
                let (mut repo, branch) = self.open(&state)?;
                repo.checkout(CheckoutMode::Wip, &branch)?;
                let commit = repo.commit_changes(message)?;
                Ok(format!("[{} {}] {}", branch, commit.hash.short(), commit.message))
            }
            Commands::Merge {
                reference,
                message,
                strategy,
            } => {
                let (mut repo, branch) = self.open(&state)?;
                repo.checkout(CheckoutMode::Branch, &branch)?;
                let target = repo.resolve_commit(reference)?.hash;
                let message = message
                    .clone()
                    .unwrap_or_else(|| format!("Merge {} into {}", reference, branch));
                let resolver = resolver_for(*strategy);
                let outcome = repo.merge(&self.operator, &target, &message, resolver.as_ref())?;
                let summary = format!("{}: {} is now {}", outcome.kind(), branch, outcome.commit().hash.short());

                // Carry the user's wip along to the new head.
                match repo.checkout(CheckoutMode::Wip, &branch).map(|_| ()) {
                    Ok(()) => {}
                    Err(VersionError::NotFound { kind: "wip", .. }) => return Ok(summary),
                    Err(e) => return Err(e),
                }
                match repo.rebase_wip(resolver.as_ref()) {
                    Ok(_) => Ok(summary),
                    Err(e @ VersionError::Conflict { .. }) => {
                        warn!(error = %e, "Wip not rebased after merge");
                        Ok(format!("{}\nwip left on the old head: run `versa rebase` with a strategy", summary))
                    }
                    Err(e) => Err(e),
                }
            }
            Commands::Rebase { strategy } => {
                let (mut repo, branch) = self.open(&state)?;
                repo.checkout(CheckoutMode::Wip, &branch)?;
                let resolver = resolver_for(*strategy);
                let wip = repo.rebase_wip(resolver.as_ref())?;
                let base = wip.base_commit.map_or_else(|| "(unborn)".to_string(), |h| h.short());
                Ok(format!("Rebased wip onto {}", base))
            }
            Commands::Revert => {
                let (mut repo, branch) = self.open(&state)?;
                repo.checkout(CheckoutMode::Wip, &branch)?;
                repo.revert_wip()?;
                Ok(format!("Reverted pending changes on {}", branch))
            }
            Commands::Log { limit, format } => {
                let (mut repo, branch) = self.open(&state)?;
                repo.checkout(CheckoutMode::Branch, &branch)?;
                format_log(&repo.log(*limit)?, format)
            }
            Commands::Diff { from, to, format } => {
                let (repo, _) = self.open(&state)?;
                let from = repo.resolve_commit(from)?.hash;
                let to = repo.resolve_commit(to)?.hash;
                format_changes(&repo.diff_commits(&from, &to)?, format)
            }
        }
    }

    fn handle_init(&self, state: &mut WorkspaceState, branch: &str) -> Result<String, VersionError> {
        if state.repositories.contains_key(&self.repo_name) {
            return Err(VersionError::InvalidState {
                operation: "init",
                expected: "no repository",
                actual: format!("repository {} exists", self.repo_name),
            });
        }
        let id = Uuid::new_v4();
        WorkRepository::init(self.store.clone(), id, self.operator.clone(), branch)?;
        state.repositories.insert(
            self.repo_name.clone(),
            RepositoryEntry {
                id,
                branch: branch.to_string(),
            },
        );
        state.save(&self.state_path)?;
        info!(repo = %self.repo_name, repository = %id, "Initialized workspace repository");
        Ok(format!("Initialized repository {} ({}) on branch {}", self.repo_name, id, branch))
    }

    fn handle_branch_command(&self, state: &WorkspaceState, command: &BranchCommands) -> Result<String, VersionError> {
        let (mut repo, current) = self.open(state)?;
        match command {
            BranchCommands::Create { name, from } => {
                let head = match from {
                    Some(reference) => Some(repo.resolve_commit(reference)?.hash),
                    None => {
                        repo.checkout(CheckoutMode::Branch, &current)?;
                        repo.current_branch().and_then(|b| b.head)
                    }
                };
                let branch = repo.create_branch(name, head)?;
                let at = branch.head.map_or_else(|| "(unborn)".to_string(), |h| h.short());
                Ok(format!("Created branch {} at {}", name, at))
            }
            BranchCommands::Delete { name } => {
                if *name == current {
                    return Err(VersionError::InvalidState {
                        operation: "branch delete",
                        expected: "another branch checked out",
                        actual: format!("on {}", current),
                    });
                }
                repo.delete_branch(name)?;
                Ok(format!("Deleted branch {}", name))
            }
            BranchCommands::List => Ok(format_branches(&repo.list_branches()?, Some(&current))),
        }
    }

    /// Work repository for the selected repository, plus its checked-out branch.
    fn open(&self, state: &WorkspaceState) -> Result<(WorkRepository, String), VersionError> {
        let entry = state.repository(&self.repo_name)?;
        let repo = WorkRepository::new(self.store.clone(), entry.id, self.operator.clone())
            .with_max_merge_depth(self.config.merge.max_recursion_depth);
        Ok((repo, entry.branch.clone()))
    }

    /// Checked out on the operator's wip, created if missing.
    fn open_wip(&self, state: &WorkspaceState) -> Result<WorkRepository, VersionError> {
        let (mut repo, branch) = self.open(state)?;
        match repo.checkout(CheckoutMode::Wip, &branch).map(|_| ()) {
            Ok(_) => {}
            Err(VersionError::NotFound { kind: "wip", .. }) => {
                repo.checkout(CheckoutMode::Branch, &branch)?;
                repo.get_or_create_wip()?;
            }
            Err(e) => return Err(e),
        }
        Ok(repo)
    }

    /// The operator's wip if there is one, else the branch head.
    fn open_view(&self, state: &WorkspaceState) -> Result<WorkRepository, VersionError> {
        let (mut repo, branch) = self.open(state)?;
        match repo.checkout(CheckoutMode::Wip, &branch).map(|_| ()) {
            Ok(_) => {}
            Err(VersionError::NotFound { kind: "wip", .. }) => {
                repo.checkout(CheckoutMode::Branch, &branch)?;
            }
            Err(e) => return Err(e),
        }
        Ok(repo)
    }

    fn store_file(
        &self,
        state: &WorkspaceState,
        file: &Path,
        executable: bool,
    ) -> Result<crate::object::Blob, VersionError> {
        let entry = state.repository(&self.repo_name)?;
        let properties = if executable {
            Properties::executable()
        } else {
            Properties::regular()
        };
        let mut reader = std::fs::File::open(file).map_err(StorageError::from)?;
        write_blob(self.blocks.as_ref(), self.store.objects(), entry.id, &mut reader, properties)
    }
}
