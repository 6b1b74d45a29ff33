//! Configuration
//!
//! Layered configuration for the engine and the CLI. Sources are merged in
//! increasing precedence:
//!
//! 1. Built-in defaults
//! 2. Global file: `~/.config/versa/config.toml`
//! 3. Workspace files: `config/config.toml`, then `config/{VERSA_ENV}.toml`
//! 4. Environment variables prefixed `VERSA__` (e.g. `VERSA__STORAGE__BACKEND=memory`)
//!
//! Relative storage and block paths resolve against the workspace root.

use crate::error::VersionError;
use crate::logging::LoggingConfig;
use crate::merge::DEFAULT_MAX_RECURSION_DEPTH;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Object store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Sled database directory
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".versa/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockConfig {
    /// Root directory of the local block adapter
    #[serde(default = "default_block_root")]
    pub root: PathBuf,
}

fn default_block_root() -> PathBuf {
    PathBuf::from(".versa/blocks")
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            root: default_block_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeConfig {
    /// Bound on recursive merge-base construction
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: usize,
}

fn default_max_recursion_depth() -> usize {
    DEFAULT_MAX_RECURSION_DEPTH
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: default_max_recursion_depth(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VersaConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub blocks: BlockConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyPath { field: &'static str },
    ZeroRecursionDepth,
    Logging(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyPath { field } => write!(f, "{} must not be empty", field),
            ValidationError::ZeroRecursionDepth => {
                write!(f, "merge.max_recursion_depth must be at least 1")
            }
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl VersaConfig {
    /// Check values the type system cannot. Collects every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.backend == StorageBackend::Sled && self.storage.path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyPath { field: "storage.path" });
        }
        if self.blocks.root.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyPath { field: "blocks.root" });
        }
        if self.merge.max_recursion_depth == 0 {
            errors.push(ValidationError::ZeroRecursionDepth);
        }
        if let Err(msg) = self.logging.validate() {
            errors.push(ValidationError::Logging(msg));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Resolve relative storage, block and log paths against `root`.
    pub fn resolve_paths(&mut self, root: &Path) {
        for path in [
            &mut self.storage.path,
            &mut self.blocks.root,
            &mut self.logging.file,
        ] {
            if path.is_relative() && !path.as_os_str().is_empty() {
                *path = root.join(&*path);
            }
        }
    }
}

fn validated(config: VersaConfig) -> Result<VersaConfig, VersionError> {
    config.validate().map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        VersionError::ConfigError(format!("Invalid configuration: {}", messages.join("; ")))
    })?;
    Ok(config)
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.backend", "sled")?
        .set_default("storage.path", default_store_path().to_string_lossy().as_ref())?
        .set_default("blocks.root", default_block_root().to_string_lossy().as_ref())?
        .set_default("merge.max_recursion_depth", DEFAULT_MAX_RECURSION_DEPTH as i64)
}

/// Config files in increasing precedence. Missing ones are skipped.
fn layered_files(workspace_root: &Path) -> Vec<PathBuf> {
    let env_name = std::env::var("VERSA_ENV").unwrap_or_else(|_| "development".to_string());
    let config_dir = workspace_root.join("config");

    let mut files: Vec<PathBuf> = ConfigLoader::global_config_path().into_iter().collect();
    files.push(config_dir.join("config.toml"));
    files.push(config_dir.join(format!("{}.toml", env_name)));
    files
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the layered configuration for a workspace.
    pub fn load(workspace_root: &Path) -> Result<VersaConfig, VersionError> {
        let mut builder = builder_with_defaults()?;
        for path in layered_files(workspace_root) {
            if path.exists() {
                debug!(config_path = %path.display(), "Adding configuration file");
                builder = builder.add_source(File::from(path.as_path()));
            }
        }
        let builder = builder.add_source(
            Environment::with_prefix("VERSA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: VersaConfig = builder.build()?.try_deserialize()?;
        config.resolve_paths(workspace_root);
        debug!(
            workspace = %workspace_root.display(),
            backend = ?config.storage.backend,
            "Configuration loaded"
        );
        validated(config)
    }

    /// Load a single file on top of the defaults, without global,
    /// workspace or environment layers.
    pub fn load_from_file(path: &Path) -> Result<VersaConfig, VersionError> {
        let config: VersaConfig = builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        validated(config)
    }

    /// `~/.config/versa/config.toml`, if `HOME` is set.
    pub fn global_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("versa")
                .join("config.toml")
        })
    }
}
