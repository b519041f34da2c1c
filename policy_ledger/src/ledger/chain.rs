// src/ledger/chain.rs
//
// Ledger entries and the hash chain over them.
//
// Entry hash:
//
//   sha256("{policy_hash}|{verified_reward:.6}|{agent_id}|{timestamp}|{previous_hash}")
//
// The reward is rendered with fixed precision so the digest does not depend
// on float formatting. The first entry links to GENESIS_HASH.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::claim::hash_prefix;
use crate::rl::policy::sha256_hex;

/// `previous_hash` of the first entry.
pub const GENESIS_HASH: &str = "genesis";

/// Immutable record of a verified fact. Holds no claim data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub policy_hash: String,
    pub verified_reward: f64,
    pub agent_id: String,
    /// UTC, `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
    pub timestamp: String,
    pub previous_hash: String,
    pub current_hash: String,
}

impl LedgerEntry {
    /// Build an entry and compute its hash.
    pub fn new(
        policy_hash: &str,
        verified_reward: f64,
        agent_id: &str,
        timestamp: String,
        previous_hash: String,
    ) -> Self {
        let current_hash =
            compute_entry_hash(policy_hash, verified_reward, agent_id, &timestamp, &previous_hash);
        Self {
            policy_hash: policy_hash.to_string(),
            verified_reward,
            agent_id: agent_id.to_string(),
            timestamp,
            previous_hash,
            current_hash,
        }
    }

    /// Hash recomputed from the entry's fields.
    pub fn recompute_hash(&self) -> String {
        compute_entry_hash(
            &self.policy_hash,
            self.verified_reward,
            &self.agent_id,
            &self.timestamp,
            &self.previous_hash,
        )
    }
}

pub fn compute_entry_hash(
    policy_hash: &str,
    verified_reward: f64,
    agent_id: &str,
    timestamp: &str,
    previous_hash: &str,
) -> String {
    let input = format!("{policy_hash}|{verified_reward:.6}|{agent_id}|{timestamp}|{previous_hash}");
    sha256_hex(input.as_bytes())
}

/// First violation found while walking the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("entry 0: previous_hash must be '{}', found '{found}'", GENESIS_HASH)]
    MissingGenesis { found: String },

    #[error("entry {index}: hash mismatch (stored {stored}..., recomputed {computed}...)")]
    HashMismatch {
        index: usize,
        stored: String,
        computed: String,
    },

    #[error(
        "entry {index}: chain break (previous_hash {previous_hash}... does not match the preceding entry's current_hash {expected}...)"
    )]
    ChainBreak {
        index: usize,
        previous_hash: String,
        expected: String,
    },
}

impl ChainViolation {
    /// Index of the offending entry.
    pub fn index(&self) -> usize {
        match self {
            ChainViolation::MissingGenesis { .. } => 0,
            ChainViolation::HashMismatch { index, .. } | ChainViolation::ChainBreak { index, .. } => {
                *index
            }
        }
    }
}

/// Walk the chain: genesis link, per-entry hash, then link to predecessor.
pub fn verify_chain(entries: &[LedgerEntry]) -> Result<(), ChainViolation> {
    if let Some(first) = entries.first() {
        if first.previous_hash != GENESIS_HASH {
            return Err(ChainViolation::MissingGenesis {
                found: first.previous_hash.clone(),
            });
        }
    }

    for (index, entry) in entries.iter().enumerate() {
        let computed = entry.recompute_hash();
        if computed != entry.current_hash {
            return Err(ChainViolation::HashMismatch {
                index,
                stored: hash_prefix(&entry.current_hash).to_string(),
                computed: hash_prefix(&computed).to_string(),
            });
        }
        if index > 0 {
            let prev = &entries[index - 1];
            if entry.previous_hash != prev.current_hash {
                return Err(ChainViolation::ChainBreak {
                    index,
                    previous_hash: hash_prefix(&entry.previous_hash).to_string(),
                    expected: hash_prefix(&prev.current_hash).to_string(),
                });
            }
        }
    }
    Ok(())
}
