//! # Model Registry
//!
//! Loads every persisted sub-model artifact from one directory at startup
//! and serves existence-checked lookups for the lifetime of the process.
//!
//! A filename that does not match the `tov_r1_<ModelKey>.toml` grammar is
//! ignored; a filename that matches but fails to deserialize aborts the load.
//! Treating a corrupt artifact as "model absent" would be indistinguishable
//! from a legitimately missing sub-model and could mask data corruption, so
//! partial registries are never constructed. A key with no artifact is a
//! normal outcome and simply resolves to `None` at lookup time.

use crate::model::{ModelError, ScoringArtifact};
use crate::taxonomy;
use ahash::AHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Immutable ModelKey -> Scoring Capability mapping. Built once before
/// serving begins; safe to share across concurrent inference calls.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    artifacts: AHashMap<String, ScoringArtifact>,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to scan model directory '{path}': {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to load model artifact '{path}': {source}")]
    Artifact {
        path: PathBuf,
        source: ModelError,
    },
    #[error(
        "model artifact '{path}' embeds key '{embedded}' but its filename names key '{named}'"
    )]
    KeyMismatch {
        path: PathBuf,
        embedded: String,
        named: String,
    },
}

impl ModelRegistry {
    /// Scans `dir` once and loads every artifact matching the naming grammar.
    pub fn load(dir: &Path) -> Result<Self, RegistryError> {
        let entries = fs::read_dir(dir).map_err(|source| RegistryError::Scan {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut artifacts = AHashMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| RegistryError::Scan {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(key) = taxonomy::key_from_file_name(file_name) else {
                continue;
            };

            let artifact =
                ScoringArtifact::load(&path).map_err(|source| RegistryError::Artifact {
                    path: path.clone(),
                    source,
                })?;
            if artifact.key != key {
                return Err(RegistryError::KeyMismatch {
                    named: key.to_string(),
                    embedded: artifact.key,
                    path,
                });
            }
            log::debug!("Loaded sub-model '{key}'");
            artifacts.insert(key.to_string(), artifact);
        }

        log::info!(
            "Model registry loaded: {} sub-model(s) from '{}'",
            artifacts.len(),
            dir.display()
        );
        Ok(ModelRegistry { artifacts })
    }

    /// Builds a registry directly from in-memory artifacts, keyed by each
    /// artifact's embedded ModelKey.
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = ScoringArtifact>) -> Self {
        ModelRegistry {
            artifacts: artifacts
                .into_iter()
                .map(|artifact| (artifact.key.clone(), artifact))
                .collect(),
        }
    }

    /// Existence-checked lookup. Absence is an expected, non-error outcome:
    /// it signals the caller to use the fallback distribution for this key.
    pub fn lookup(&self, key: &str) -> Option<&ScoringArtifact> {
        self.artifacts.get(key)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Loaded ModelKeys in sorted order, for logging and diagnostics.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.artifacts.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
