// src/ledger/mod.rs
//
// Append-only, hash-chained ledger of verified policies.
//
// - append() trusts its caller: it is only invoked after a VALID verification.
// - Every append rewrites the backing file atomically (temp + rename).
// - Loading re-verifies the whole chain; any failure refuses to open the
//   ledger. There is no repair path.
//
// A single RwLock guards the entries. Appends hold the write lock across
// read-tail, hash, push and persist, so concurrent appends serialise and never
// race on the previous hash; readers never see a half-applied append.

pub mod chain;
pub mod clock;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::claim::hash_prefix;
use crate::persist::atomic_write;

pub use chain::{compute_entry_hash, verify_chain, ChainViolation, LedgerEntry, GENESIS_HASH};
pub use clock::{Clock, SteppingClock, SystemClock};

/// Version tag written to the ledger file.
pub const LEDGER_VERSION: &str = "1.0";

/// Why a persisted ledger was refused.
#[derive(Debug, Error)]
pub enum Corruption {
    #[error("malformed ledger document: {0}")]
    Parse(String),

    #[error("unsupported ledger_version {found:?} (expected {:?})", LEDGER_VERSION)]
    UnsupportedVersion { found: String },

    #[error("total_entries is {declared} but {actual} entries are present")]
    CountMismatch { declared: usize, actual: usize },

    #[error("integrity check failed: {0}")]
    Chain(#[from] ChainViolation),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing file exists but could not be read.
    #[error("cannot read ledger {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The backing file is corrupted or tampered with.
    #[error("LEDGER CORRUPTION in {path}: {cause}; refusing to load (ledgers are never auto-repaired)")]
    Corrupted { path: String, cause: Corruption },

    /// Persisting an append failed; the append was rolled back.
    #[error("failed to persist ledger {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("verified_reward must be finite, got {reward}")]
    NonFiniteReward { reward: f64 },
}

/// On-disk document.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerDocument {
    ledger_version: String,
    total_entries: usize,
    entries: Vec<LedgerEntry>,
}

pub struct Ledger {
    path: Option<PathBuf>,
    entries: RwLock<Vec<LedgerEntry>>,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("path", &self.path)
            .field("entries", &self.len())
            .finish()
    }
}

impl Ledger {
    /// Ledger with no backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(Vec::new()),
            clock: Box::new(SystemClock),
        }
    }

    /// Open a file-backed ledger. A missing file starts an empty ledger; an
    /// unreadable, malformed or tampered file is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            load_entries(&path)?
        } else {
            Vec::new()
        };
        info!(path = %path.display(), entries = entries.len(), "ledger loaded");
        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
            clock: Box::new(SystemClock),
        })
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a verified policy. Only call after a VALID verification.
    pub fn append(
        &self,
        policy_hash: &str,
        verified_reward: f64,
        agent_id: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        if !verified_reward.is_finite() {
            return Err(LedgerError::NonFiniteReward {
                reward: verified_reward,
            });
        }

        let mut entries = self.write();
        let tail = entries.last();
        let previous_hash = tail
            .map(|e| e.current_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let timestamp = clock::next_timestamp(self.clock.as_ref(), tail.map(|e| e.timestamp.as_str()));

        let entry = LedgerEntry::new(policy_hash, verified_reward, agent_id, timestamp, previous_hash);
        entries.push(entry.clone());

        if let Some(path) = &self.path {
            if let Err(source) = persist(path, &entries) {
                entries.pop();
                error!(path = %path.display(), error = %source, "ledger persist failed; append rolled back");
                return Err(LedgerError::Persist {
                    path: path.display().to_string(),
                    source,
                });
            }
        }

        info!(
            index = entries.len() - 1,
            agent_id = %entry.agent_id,
            policy_hash = %hash_prefix(&entry.policy_hash),
            current_hash = %hash_prefix(&entry.current_hash),
            "ledger append"
        );
        Ok(entry)
    }

    /// All entries in append order (a copy).
    pub fn read_all(&self) -> Vec<LedgerEntry> {
        self.read().clone()
    }

    pub fn latest(&self) -> Option<LedgerEntry> {
        self.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// First entry recording `policy_hash`, if any.
    pub fn find_by_policy_hash(&self, policy_hash: &str) -> Option<LedgerEntry> {
        self.read()
            .iter()
            .find(|e| e.policy_hash == policy_hash)
            .cloned()
    }

    /// Walk the in-memory chain.
    pub fn verify_integrity(&self) -> Result<(), ChainViolation> {
        let result = verify_chain(&self.read());
        if let Err(violation) = &result {
            error!(error = %violation, "ledger integrity check failed");
        }
        result
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<LedgerEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<LedgerEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read and fully validate a persisted ledger.
pub fn load_entries(path: &Path) -> Result<Vec<LedgerEntry>, LedgerError> {
    let corrupted = |cause: Corruption| {
        error!(path = %path.display(), error = %cause, "ledger corruption detected");
        LedgerError::Corrupted {
            path: path.display().to_string(),
            cause,
        }
    };

    let bytes = fs::read(path).map_err(|source| LedgerError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let doc: LedgerDocument =
        serde_json::from_slice(&bytes).map_err(|e| corrupted(Corruption::Parse(e.to_string())))?;

    if doc.ledger_version != LEDGER_VERSION {
        return Err(corrupted(Corruption::UnsupportedVersion {
            found: doc.ledger_version,
        }));
    }
    if doc.total_entries != doc.entries.len() {
        return Err(corrupted(Corruption::CountMismatch {
            declared: doc.total_entries,
            actual: doc.entries.len(),
        }));
    }
    verify_chain(&doc.entries).map_err(|v| corrupted(Corruption::Chain(v)))?;
    Ok(doc.entries)
}

fn persist(path: &Path, entries: &[LedgerEntry]) -> std::io::Result<()> {
    let doc = LedgerDocument {
        ledger_version: LEDGER_VERSION.to_string(),
        total_entries: entries.len(),
        entries: entries.to_vec(),
    };
    let mut json = serde_json::to_vec_pretty(&doc)?;
    json.push(b'\n');
    atomic_write(path, &json)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn clock() -> SteppingClock {
        SteppingClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            Duration::seconds(1),
        )
    }

    #[test]
    fn first_entry_links_to_genesis_and_chain_grows() {
        let ledger = Ledger::in_memory().with_clock(clock());
        let a = ledger.append("p1", 12.5, "agent_a").unwrap();
        let b = ledger.append("p2", 9.0, "agent_b").unwrap();
        assert_eq!(a.previous_hash, GENESIS_HASH);
        assert_eq!(b.previous_hash, a.current_hash);
        assert_eq!(a.timestamp, "2026-03-01T12:00:00.000000Z");
        assert_eq!(ledger.verify_integrity(), Ok(()));
        assert_eq!(ledger.latest(), Some(b));
    }

    #[test]
    fn read_all_is_a_copy() {
        let ledger = Ledger::in_memory();
        ledger.append("p1", 1.0, "a").unwrap();
        let mut copy = ledger.read_all();
        copy[0].verified_reward = 1000.0;
        copy.clear();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.read_all()[0].verified_reward, 1.0);
    }

    #[test]
    fn empty_ledger_behaviour() {
        let ledger = Ledger::in_memory();
        assert!(ledger.is_empty());
        assert!(ledger.read_all().is_empty());
        assert_eq!(ledger.latest(), None);
        assert_eq!(ledger.verify_integrity(), Ok(()));
    }

    #[test]
    fn rejects_non_finite_reward() {
        let ledger = Ledger::in_memory();
        assert!(matches!(
            ledger.append("p", f64::INFINITY, "a"),
            Err(LedgerError::NonFiniteReward { .. })
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("ledger.json");
        let ledger = Ledger::open(&path).unwrap();
        assert!(matches!(
            ledger.append("p", 1.0, "a"),
            Err(LedgerError::Persist { .. })
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn reopen_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        {
            let ledger = Ledger::open(&path).unwrap().with_clock(clock());
            ledger.append("p1", 3.25, "a").unwrap();
            ledger.append("p2", -1.125, "b").unwrap();
        }
        let reopened = Ledger::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.verify_integrity(), Ok(()));
        assert_eq!(reopened.find_by_policy_hash("p2").unwrap().agent_id, "b");
        assert_eq!(reopened.find_by_policy_hash("p3"), None);
    }
}
