//! Workspace state: which repositories live in this workspace and which
//! branch each one has checked out. Stored as TOML under `.versa/`.

use crate::error::{StorageError, VersionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub id: Uuid,
    pub branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceState {
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryEntry>,
}

impl WorkspaceState {
    pub fn path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".versa").join("repositories.toml")
    }

    /// Missing file means a fresh workspace.
    pub fn load(path: &Path) -> Result<Self, VersionError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(StorageError::from)?;
        toml::from_str(&text)
            .map_err(|e| VersionError::ConfigError(format!("Invalid workspace state {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), VersionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| StorageError::Codec(format!("Failed to encode workspace state: {}", e)))?;
        std::fs::write(path, text).map_err(StorageError::from)?;
        Ok(())
    }

    pub fn repository(&self, name: &str) -> Result<&RepositoryEntry, VersionError> {
        self.repositories
            .get(name)
            .ok_or_else(|| VersionError::not_found("repository", name))
    }
}
