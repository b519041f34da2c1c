// src/artifact_store.rs
//
// On-disk policy artifacts, one file per policy: `<dir>/<policy_hash>.json`.
//
//   {
//     "policy":   { "(a, b, c, d, e)": action, ... },
//     "metadata": { "agent_id": ..., "claimed_reward": ..., "policy_hash": ...,
//                   "env_id": ... }
//   }
//
// Writers always emit this wrapped form. Readers also accept a bare mapping
// (the `policy` object on its own). A document with `metadata` but no
// `policy` is corrupt, not bare.
//
// Loaded tables are re-hashed canonically; a file whose content does not hash
// to its name is corrupt.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::persist::atomic_write;
use crate::rl::policy::PolicyArtifact;

/// Metadata stored next to the policy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub agent_id: String,
    pub claimed_reward: f64,
    pub policy_hash: String,
    /// Environment the policy was trained and claimed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("policy {policy_hash} not found in {dir}")]
    NotFound { policy_hash: String, dir: String },

    #[error("policy file {path} is corrupted: {details}")]
    Corrupted { path: String, details: String },

    #[error("artifact store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{policy_hash:?} is not a policy hash (expected 64 lowercase hex characters)")]
    InvalidHash { policy_hash: String },
}

#[derive(Serialize)]
struct WrappedArtifact<'a> {
    policy: Value,
    metadata: &'a ArtifactMetadata,
}

/// Directory of policy artifact files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, policy_hash: &str) -> PathBuf {
        self.dir.join(format!("{policy_hash}.json"))
    }

    /// Write the artifact in wrapped form; returns the file path.
    pub fn save(&self, artifact: &PolicyArtifact, metadata: &ArtifactMetadata) -> Result<PathBuf, StoreError> {
        let io_err = |path: &Path, source: io::Error| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(|e| io_err(self.dir.as_path(), e))?;
        let path = self.path_for(artifact.hash());
        let doc = WrappedArtifact {
            policy: artifact.to_json(),
            metadata,
        };
        let mut json = serde_json::to_vec_pretty(&doc).map_err(|e| io_err(path.as_path(), e.into()))?;
        json.push(b'\n');
        atomic_write(&path, &json).map_err(|e| io_err(path.as_path(), e))?;
        debug!(path = %path.display(), "policy artifact saved");
        Ok(path)
    }

    /// Load and validate the artifact stored under `policy_hash`.
    pub fn load(&self, policy_hash: &str) -> Result<PolicyArtifact, StoreError> {
        let (path, doc) = self.read_document(policy_hash)?;
        let corrupted = |details: String| StoreError::Corrupted {
            path: path.display().to_string(),
            details,
        };

        let table = unwrap_policy(&doc).map_err(|d| corrupted(d.to_string()))?;
        let artifact = PolicyArtifact::from_json(table).map_err(|e| corrupted(e.to_string()))?;

        if artifact.hash() != policy_hash {
            return Err(corrupted(format!(
                "content hashes to {}, not {policy_hash}",
                artifact.hash()
            )));
        }
        Ok(artifact)
    }

    /// Metadata stored with `policy_hash`. None for a bare mapping.
    pub fn load_metadata(&self, policy_hash: &str) -> Result<Option<ArtifactMetadata>, StoreError> {
        let (path, doc) = self.read_document(policy_hash)?;
        match doc.get("metadata") {
            None => Ok(None),
            Some(meta) => serde_json::from_value(meta.clone())
                .map(Some)
                .map_err(|e| StoreError::Corrupted {
                    path: path.display().to_string(),
                    details: format!("invalid metadata: {e}"),
                }),
        }
    }

    fn read_document(&self, policy_hash: &str) -> Result<(PathBuf, Value), StoreError> {
        if !is_policy_hash(policy_hash) {
            return Err(StoreError::InvalidHash {
                policy_hash: policy_hash.to_string(),
            });
        }

        let path = self.path_for(policy_hash);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    policy_hash: policy_hash.to_string(),
                    dir: self.dir.display().to_string(),
                })
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(doc) => Ok((path, doc)),
            Err(e) => Err(StoreError::Corrupted {
                path: path.display().to_string(),
                details: e.to_string(),
            }),
        }
    }

    /// Hashes of every artifact file in the store, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.display().to_string(),
                    source,
                })
            }
        };
        let mut hashes: Vec<String> = read_dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".json")
                    .filter(|stem| is_policy_hash(stem))
                    .map(str::to_string)
            })
            .collect();
        hashes.sort();
        Ok(hashes)
    }
}

/// Select the policy table inside a stored document.
fn unwrap_policy(doc: &Value) -> Result<&Value, &'static str> {
    let object = doc.as_object().ok_or("document is not a JSON object")?;
    match object.get("policy") {
        Some(policy) => Ok(policy),
        None if object.contains_key("metadata") => Err("missing required key 'policy'"),
        None => Ok(doc),
    }
}

fn is_policy_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
