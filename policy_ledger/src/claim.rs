// src/claim.rs
//
// PolicyClaim: an agent's unverified assertion of {policy, reward}.
//
// Claims are consumed once by the verifier and never persisted by the ledger.
// The JSON form (claim file) carries the artifact bytes hex-encoded so the
// exact bytes survive a round trip through disk.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::atomic_write;

/// An agent's claim about a policy artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyClaim {
    pub agent_id: String,
    /// Environment identifier (seed, horizon, profile).
    pub env_id: String,
    /// Hex SHA-256 the agent states for `policy_artifact`.
    pub policy_hash: String,
    /// Raw artifact bytes as submitted.
    #[serde(rename = "policy_artifact_hex", with = "hex_bytes")]
    pub policy_artifact: Vec<u8>,
    pub claimed_reward: f64,
}

impl PolicyClaim {
    /// Copy of this claim with a different reward (used to build dishonest
    /// claims in audits and tests).
    pub fn with_claimed_reward(&self, claimed_reward: f64) -> Self {
        Self {
            claimed_reward,
            ..self.clone()
        }
    }

    /// Short form of the hash for log lines.
    pub fn hash_prefix(&self) -> &str {
        hash_prefix(&self.policy_hash)
    }
}

/// First 16 characters of a hash (or the whole string if shorter).
pub fn hash_prefix(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

#[derive(Debug, Error)]
pub enum ClaimFileError {
    #[error("claim file I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("claim file {path} is not a valid claim: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Write a claim as pretty JSON.
pub fn write_claim_file(path: &Path, claim: &PolicyClaim) -> Result<(), ClaimFileError> {
    let io_err = |source| ClaimFileError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut json = serde_json::to_vec_pretty(claim).map_err(|source| ClaimFileError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    json.push(b'\n');
    atomic_write(path, &json).map_err(io_err)
}

/// Read a claim written by `write_claim_file`.
pub fn read_claim_file(path: &Path) -> Result<PolicyClaim, ClaimFileError> {
    let bytes = fs::read(path).map_err(|source| ClaimFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ClaimFileError::Parse {
        path: path.display().to_string(),
        source,
    })
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim() -> PolicyClaim {
        PolicyClaim {
            agent_id: "agent_a".to_string(),
            env_id: "env_seed_42_horizon_24".to_string(),
            policy_hash: "ab".repeat(32),
            policy_artifact: br#"{"(0, 0, 0, 0, 0)":1}"#.to_vec(),
            claimed_reward: 12.5,
        }
    }

    #[test]
    fn claim_file_round_trips_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claim.json");
        write_claim_file(&path, &claim()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("policy_artifact_hex"));
        assert_eq!(read_claim_file(&path).unwrap(), claim());
    }

    #[test]
    fn bad_hex_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claim.json");
        fs::write(
            &path,
            r#"{"agent_id":"a","env_id":"e","policy_hash":"h","policy_artifact_hex":"zz","claimed_reward":1.0}"#,
        )
        .unwrap();
        assert!(matches!(
            read_claim_file(&path),
            Err(ClaimFileError::Parse { .. })
        ));
    }

    #[test]
    fn hash_prefix_handles_short_input() {
        assert_eq!(hash_prefix("abc"), "abc");
        assert_eq!(hash_prefix(&"f".repeat(64)).len(), 16);
    }
}
