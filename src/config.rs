use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::api::error::{Error, Result};

/// Where run metadata is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Filesystem { root: PathBuf },
}

/// Where model binaries are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelRepositoryConfig {
    Memory,
    Filesystem { root: PathBuf },
    Http { url: String },
}

/// Backend selection for a [`TrackingContext`](crate::TrackingContext).
///
/// ```json
/// {
///     "storage": { "type": "filesystem", "root": "./mltrack" },
///     "model_repository": { "type": "http", "url": "http://127.0.0.1:8080/models" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub storage: StorageConfig,
    pub model_repository: ModelRepositoryConfig,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig {
            storage: StorageConfig::Memory,
            model_repository: ModelRepositoryConfig::Memory,
        }
    }
}

impl TrackingConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::Configuration(err.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&json)
    }
}
