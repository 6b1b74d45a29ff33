//! Core value types shared across the engine.

use crate::error::VersionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a fingerprint in bytes (BLAKE3 output).
pub const HASH_LEN: usize = 32;

/// Content fingerprint. Equal content always yields an equal fingerprint, and
/// every stored object is keyed by one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a full-length lowercase or uppercase hex fingerprint.
    pub fn from_hex(s: &str) -> Result<Self, VersionError> {
        let bytes = hex::decode(s.trim()).map_err(|e| VersionError::InvalidHash(format!("{s}: {e}")))?;
        let bytes: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| VersionError::InvalidHash(format!("{s}: expected {HASH_LEN} bytes")))?;
        Ok(Hash(bytes))
    }

    /// First 12 hex characters, for logs and CLI output.
    pub fn short(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(12);
        s
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl FromStr for Hash {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl From<blake3::Hash> for Hash {
    fn from(value: blake3::Hash) -> Self {
        Hash(*value.as_bytes())
    }
}

/// File mode carried in object properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
    Directory,
}

impl FileMode {
    /// Stable single-byte tag used in fingerprints.
    pub(crate) fn tag(self) -> u8 {
        match self {
            FileMode::Regular => b'r',
            FileMode::Executable => b'x',
            FileMode::Directory => b'd',
        }
    }
}

/// Object properties. Part of every blob and tree fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Properties {
    pub mode: FileMode,
}

impl Properties {
    pub fn regular() -> Self {
        Self {
            mode: FileMode::Regular,
        }
    }

    pub fn executable() -> Self {
        Self {
            mode: FileMode::Executable,
        }
    }

    pub fn directory() -> Self {
        Self {
            mode: FileMode::Directory,
        }
    }
}

/// Author or committer identity plus the moment of signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<Utc>,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, Utc::now())
    }
}

/// The user a `WorkRepository` acts for. Identities are resolved upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    pub email: String,
}

impl Operator {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn signature(&self) -> Signature {
        Signature::now(self.name.clone(), self.email.clone())
    }
}
