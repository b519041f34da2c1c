// src/marketplace.rs
//
// Deterministic selection over ledger contents.
//
// Ranking key: verified_reward descending, then timestamp ascending. Ledger
// timestamps are fixed-width UTC strings, so string order is time order.
// Exact (reward, timestamp) ties keep ledger order (stable sort).
//
// Pure functions: same entries in, same ranking out; the ledger is only read.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ledger::{Ledger, LedgerEntry};

/// Pointer to a verified policy. No artifact, no ranking metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPolicyReference {
    pub policy_hash: String,
    pub verified_reward: f64,
    pub agent_id: String,
}

impl From<&LedgerEntry> for BestPolicyReference {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            policy_hash: entry.policy_hash.clone(),
            verified_reward: entry.verified_reward,
            agent_id: entry.agent_id.clone(),
        }
    }
}

fn rank_order(a: &LedgerEntry, b: &LedgerEntry) -> Ordering {
    b.verified_reward
        .total_cmp(&a.verified_reward)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
}

/// Highest verified reward; earliest timestamp wins ties. None when empty.
pub fn best_policy(entries: &[LedgerEntry]) -> Option<BestPolicyReference> {
    entries
        .iter()
        .reduce(|best, e| {
            if rank_order(e, best) == Ordering::Less {
                e
            } else {
                best
            }
        })
        .map(BestPolicyReference::from)
}

/// Every entry, best first.
pub fn ranked_policies(entries: &[LedgerEntry]) -> Vec<BestPolicyReference> {
    let mut sorted: Vec<&LedgerEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| rank_order(a, b));
    sorted.into_iter().map(BestPolicyReference::from).collect()
}

/// Read-only view over a ledger.
#[derive(Debug, Clone, Copy)]
pub struct Marketplace<'a> {
    ledger: &'a Ledger,
}

impl<'a> Marketplace<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    pub fn get_best_policy(&self) -> Option<BestPolicyReference> {
        best_policy(&self.ledger.read_all())
    }

    pub fn get_ranked_policies(&self) -> Vec<BestPolicyReference> {
        ranked_policies(&self.ledger.read_all())
    }
}
