//! Document configuration
//!
//! Settings for undo, transactions and object naming that can be serialized
//! and loaded from RON configuration files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

/// Whether edits are recorded for undo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UndoMode {
    Disabled,
    #[default]
    Enabled,
}

/// Behavior of `open_transaction` while a transaction is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionMode {
    /// Nesting is refused; the second open is a logged no-op
    #[default]
    Strict,
    /// The open transaction is committed before the new one starts
    AutoCommit,
}

/// Handling of a requested object name that is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamePolicy {
    /// Append the next free numeric suffix
    #[default]
    AutoSuffix,
    /// Fail with a name collision
    Reject,
}

/// Undo/redo configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    pub mode: UndoMode,
    /// Estimated bytes kept on the undo stack (0 = unlimited)
    pub memory_limit: usize,
    /// Maximum number of undo steps (0 = unlimited)
    pub max_steps: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            mode: UndoMode::Enabled,
            memory_limit: 0,
            max_steps: 20,
        }
    }
}

/// Per-document configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub undo: UndoConfig,
    pub transaction_mode: TransactionMode,
    pub name_policy: NamePolicy,
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Defaults for newly created or opened documents
    pub document: DocumentConfig,
    /// Written to `CreatedBy` / `LastModifiedBy`
    pub author: String,
    /// Written to `Company`
    pub company: String,
}

impl AppConfig {
    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron(&content)
    }

    /// Save configuration to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = self.to_ron()?;
        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AppConfig::from_ron("(document: (undo: (memory_limit: 4096)))").unwrap();
        assert_eq!(config.document.undo.memory_limit, 4096);
        assert_eq!(config.document.undo.max_steps, 20);
        assert_eq!(config.document.undo.mode, UndoMode::Enabled);
        assert_eq!(config.document.transaction_mode, TransactionMode::Strict);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rkdoc.ron");
        let mut config = AppConfig::default();
        config.author = "Tester".into();
        config.document.name_policy = NamePolicy::Reject;

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }
}
