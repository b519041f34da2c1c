// src/config.rs
//
// Pipeline configuration.
//
// Defaults, then POLICY_LEDGER_* environment overrides, then CLI flags (the
// binary applies those last). A variable that fails to parse or validate is
// ignored with a warning and the previous value is kept.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifact_store::ArtifactStore;
use crate::ledger::{Ledger, LedgerError};
use crate::rl::replay::DEFAULT_REPLAY_EPISODES;
use crate::verifier::{Verifier, DEFAULT_REWARD_THRESHOLD};

pub const ENV_REWARD_THRESHOLD: &str = "POLICY_LEDGER_REWARD_THRESHOLD";
pub const ENV_REPLAY_EPISODES: &str = "POLICY_LEDGER_REPLAY_EPISODES";
pub const ENV_LEDGER_PATH: &str = "POLICY_LEDGER_LEDGER_PATH";
pub const ENV_POLICY_DIR: &str = "POLICY_LEDGER_POLICY_DIR";
pub const ENV_AUDIT_LOG: &str = "POLICY_LEDGER_AUDIT_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Accepted |claimed - verified| reward difference.
    pub reward_threshold: f64,
    /// Episodes averaged by verification replay.
    pub replay_episodes: u32,
    pub ledger_path: PathBuf,
    pub policy_dir: PathBuf,
    /// JSONL audit log; None disables audit output.
    pub audit_log: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reward_threshold: DEFAULT_REWARD_THRESHOLD,
            replay_episodes: DEFAULT_REPLAY_EPISODES,
            ledger_path: PathBuf::from("ledger.json"),
            policy_dir: PathBuf::from("policies"),
            audit_log: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults with process environment overrides.
    ///
    /// Recognised variables:
    ///   - POLICY_LEDGER_REWARD_THRESHOLD  (f64, finite, >= 0)
    ///   - POLICY_LEDGER_REPLAY_EPISODES   (u32, >= 1)
    ///   - POLICY_LEDGER_LEDGER_PATH       (path)
    ///   - POLICY_LEDGER_POLICY_DIR        (path)
    ///   - POLICY_LEDGER_AUDIT_LOG         (path; empty disables)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = lookup(ENV_REWARD_THRESHOLD) {
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => {
                    cfg.reward_threshold = v;
                    info!(key = ENV_REWARD_THRESHOLD, value = v, "config override");
                }
                _ => warn!(
                    key = ENV_REWARD_THRESHOLD,
                    raw = %raw,
                    default = cfg.reward_threshold,
                    "expected a finite non-negative number; using default"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_REPLAY_EPISODES) {
            match raw.trim().parse::<u32>() {
                Ok(v) if v >= 1 => {
                    cfg.replay_episodes = v;
                    info!(key = ENV_REPLAY_EPISODES, value = v, "config override");
                }
                _ => warn!(
                    key = ENV_REPLAY_EPISODES,
                    raw = %raw,
                    default = cfg.replay_episodes,
                    "expected a positive integer; using default"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_LEDGER_PATH).filter(|s| !s.is_empty()) {
            cfg.ledger_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_POLICY_DIR).filter(|s| !s.is_empty()) {
            cfg.policy_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_AUDIT_LOG) {
            cfg.audit_log = (!raw.is_empty()).then(|| PathBuf::from(raw));
        }

        cfg
    }

    pub fn verifier(&self) -> Verifier {
        Verifier::new(self.reward_threshold).with_replay_episodes(self.replay_episodes)
    }

    pub fn open_ledger(&self) -> Result<Ledger, LedgerError> {
        Ledger::open(&self.ledger_path)
    }

    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.policy_dir)
    }
}
