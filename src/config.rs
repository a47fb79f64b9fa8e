//! Engine configuration loaded from JSON.
//!
//! ```json
//! {
//!   "default_connection": "main",
//!   "connections": {
//!     "main": { "kind": "sqlite", "path": "videos.db" },
//!     "scratch": { "kind": "sqlite", "path": ":memory:", "wal": false }
//!   },
//!   "auto_reset": true,
//!   "tag_prefix": ":"
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BinderyError;
use crate::tags::DEFAULT_TAG_PREFIX;

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    DEFAULT_TAG_PREFIX.to_string()
}

/// One named backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Sqlite {
        path: String,
        #[serde(default = "default_true")]
        wal: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Falls back to the first connection in name order.
    #[serde(default)]
    pub default_connection: Option<String>,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
    #[serde(default = "default_true")]
    pub auto_reset: bool,
    #[serde(default = "default_prefix")]
    pub tag_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_connection: None,
            connections: BTreeMap::new(),
            auto_reset: true,
            tag_prefix: default_prefix(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// Returns `BinderyError::Config` on malformed JSON or an inconsistent configuration.
    pub fn from_json_str(json: &str) -> Result<Self, BinderyError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| BinderyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    /// Returns `BinderyError::Config` if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BinderyError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| BinderyError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// # Errors
    /// Returns `BinderyError::Config` if the default connection is not defined or the
    /// tag prefix is empty.
    pub fn validate(&self) -> Result<(), BinderyError> {
        if let Some(default) = &self.default_connection
            && !self.connections.contains_key(default)
        {
            return Err(BinderyError::Config(format!(
                "default connection {default} is not defined"
            )));
        }
        if self.tag_prefix.is_empty() {
            return Err(BinderyError::Config("tag_prefix must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() -> Result<(), BinderyError> {
        let config = EngineConfig::from_json_str(
            r#"{ "connections": { "main": { "kind": "sqlite", "path": ":memory:" } } }"#,
        )?;
        assert!(config.auto_reset);
        assert_eq!(config.tag_prefix, ":");
        assert_eq!(
            config.connections["main"],
            ConnectionConfig::Sqlite {
                path: ":memory:".into(),
                wal: true
            }
        );
        Ok(())
    }

    #[test]
    fn undefined_default_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "default_connection": "missing" }"#).unwrap_err();
        assert!(matches!(err, BinderyError::Config(msg) if msg.contains("missing")));
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let err = EngineConfig::from_json_str(
            r#"{ "connections": { "x": { "kind": "oracle", "path": "db" } } }"#,
        );
        assert!(matches!(err, Err(BinderyError::Config(_))));
    }
}
