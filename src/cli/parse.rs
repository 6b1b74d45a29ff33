//! CLI parse: clap types for Versa. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Versa CLI - content-addressed version control for datasets
#[derive(Parser)]
#[command(name = "versa")]
#[command(about = "Content-addressed version control: trees, commits, branches and merges")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level when verbose (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Repository name within the workspace
    #[arg(long, global = true, default_value = "default")]
    pub repo: String,

    /// Acting user (defaults to $VERSA_USER, then $USER)
    #[arg(long, global = true)]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a repository with an unborn default branch
    Init {
        /// Name of the default branch
        #[arg(long, default_value = "main")]
        branch: String,
    },
    /// Branch commands (create, delete, list)
    Branch {
        #[command(subcommand)]
        command: BranchCommands,
    },
    /// Switch the workspace to another branch
    Checkout {
        branch: String,
    },
    /// Store a file and add it at a path in your wip
    Add {
        /// Path inside the repository
        path: String,
        /// Local file to store
        file: PathBuf,
        /// Mark the blob executable
        #[arg(long)]
        executable: bool,
    },
    /// Store a file and replace the blob at an existing path
    Replace {
        path: String,
        file: PathBuf,
        #[arg(long)]
        executable: bool,
    },
    /// Remove a file or directory from your wip
    Rm {
        path: String,
    },
    /// List a directory (your wip if you have one, else the branch head)
    Ls {
        #[arg(default_value = "")]
        path: String,
        /// List every leaf under the directory
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print the bytes of a file
    Cat {
        path: String,
    },
    /// Show pending changes in your wip
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Commit your wip to the current branch
    Commit {
        #[arg(short, long)]
        message: String,
    },
    /// Merge a branch or commit into the current branch
    Merge {
        /// Branch name or commit hash
        reference: String,
        #[arg(short, long)]
        message: Option<String>,
        /// How to settle paths changed on both sides
        #[arg(long, value_enum, default_value_t = Strategy::Lowest)]
        strategy: Strategy,
    },
    /// Replay your wip onto the current branch head
    Rebase {
        #[arg(long, value_enum, default_value_t = Strategy::Strict)]
        strategy: Strategy,
    },
    /// Discard every pending change in your wip
    Revert,
    /// Show history from the current branch head
    Log {
        /// Maximum number of commits
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show changes between two commits or branches
    Diff {
        from: String,
        to: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum BranchCommands {
    /// Create a branch at a commit (default: the current branch head)
    Create {
        name: String,
        /// Branch name or commit hash to start from
        #[arg(long)]
        from: Option<String>,
    },
    /// Delete a branch and every wip on it
    Delete {
        name: String,
    },
    /// List branches
    List,
}

/// Conflict strategy for merge and rebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Keep the side with the lower fingerprint (deletes win)
    Lowest,
    /// Keep the current branch's side
    Ours,
    /// Keep the incoming side
    Theirs,
    /// Fail on any conflict
    Strict,
}
