use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::domain::actors::Actor;

#[derive(Debug, Error)]
pub enum EditorKeyError {
    #[error("editor name must not be empty")]
    EmptyName,
    #[error("key hash for editor `{name}` must be 64 hex characters")]
    InvalidHash { name: String },
}

#[derive(Debug, Clone)]
struct EditorEntry {
    name: String,
    hashed_key: Vec<u8>,
}

/// Editors allowed to authenticate with a bearer key. Only SHA-256 digests
/// of the keys are held.
#[derive(Debug, Clone, Default)]
pub struct EditorDirectory {
    entries: Vec<EditorEntry>,
}

impl EditorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an editor by the hex SHA-256 digest of their key.
    pub fn with_hashed_key(
        mut self,
        name: impl Into<String>,
        key_sha256: &str,
    ) -> Result<Self, EditorKeyError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EditorKeyError::EmptyName);
        }
        let hashed_key = hex::decode(key_sha256.trim())
            .ok()
            .filter(|bytes| bytes.len() == 32)
            .ok_or_else(|| EditorKeyError::InvalidHash { name: name.clone() })?;

        self.entries.push(EditorEntry { name, hashed_key });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a presented key to an editor. Every entry is compared so the
    /// lookup time does not depend on which editor matched.
    pub fn authenticate(&self, key: &str) -> Option<Actor> {
        let hashed_input = hash_key(key);
        let mut matched = None;
        for entry in &self.entries {
            if entry.hashed_key.ct_eq(&hashed_input).unwrap_u8() == 1 && matched.is_none() {
                matched = Some(entry.name.clone());
            }
        }
        matched.map(Actor::editor)
    }
}

/// Hex SHA-256 of a bearer key, the form editors are configured with.
pub fn hash_key(key: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().to_vec()
}
