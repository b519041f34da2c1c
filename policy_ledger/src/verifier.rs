// src/verifier.rs
//
// Claim verification: "trust is derived from replayability".
//
// verify() runs four checks in order and stops at the first failure:
//
//   1. hash      sha256(artifact bytes) == claimed hash
//   2. load      artifact is a non-empty, well-formed state -> action table
//   3. replay    greedy replay on the claimed environment completes
//   4. reward    |claimed - verified| <= threshold
//
// Every outcome is a VerificationResult value; rejection is a normal result,
// not an error. The verifier holds no state between calls and never touches
// the ledger.
//
// verify_determinism() is different: a replay that disagrees with itself is
// a bug in the simulator, so it surfaces as Err(DeterminismFault).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::claim::{hash_prefix, PolicyClaim};
use crate::rl::policy::{sha256_hex, PolicyArtifact};
use crate::rl::replay::{ReplayEngine, DEFAULT_REPLAY_EPISODES};

/// Default accepted |claimed - verified| difference.
pub const DEFAULT_REWARD_THRESHOLD: f64 = 1e-6;

/// Binary verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Valid,
    Invalid,
}

/// Why a claim was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Artifact bytes do not hash to the claimed hash.
    HashMismatch,
    /// Artifact is not a loadable state -> action table.
    MalformedArtifact,
    /// Replay did not complete (e.g. malformed environment id).
    ReplayFailed,
    /// Replay completed but the reward differs from the claim.
    RewardMismatch,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::HashMismatch => "hash_mismatch",
            Rejection::MalformedArtifact => "malformed_artifact",
            Rejection::ReplayFailed => "replay_failed",
            Rejection::RewardMismatch => "reward_mismatch",
        }
    }
}

/// The verifier's sole output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub agent_id: String,
    pub policy_hash: String,
    /// None when replay never completed.
    pub verified_reward: Option<f64>,
    pub status: VerificationStatus,
    pub reason: String,
    /// Set exactly when `status` is Invalid.
    pub rejection: Option<Rejection>,
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        self.status == VerificationStatus::Valid
    }

    fn invalid(claim: &PolicyClaim, rejection: Rejection, verified: Option<f64>, reason: String) -> Self {
        Self {
            agent_id: claim.agent_id.clone(),
            policy_hash: claim.policy_hash.clone(),
            verified_reward: verified,
            status: VerificationStatus::Invalid,
            reason,
            rejection: Some(rejection),
        }
    }
}

/// Repeated replay of one claim produced differing rewards, or could not be
/// run at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeterminismFault {
    #[error("determinism check needs at least one run")]
    NoRuns,

    #[error("claim from {agent_id} cannot be replayed: {reason}")]
    NotReplayable { agent_id: String, reason: String },

    #[error(
        "non-deterministic replay for policy {policy_hash}: run 0 gave {expected}, run {run} gave {observed}"
    )]
    Diverged {
        policy_hash: String,
        run: u32,
        expected: f64,
        observed: f64,
    },
}

/// Successful determinism check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeterminismReport {
    pub runs: u32,
    pub reward: f64,
}

/// Stateless claim verifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verifier {
    reward_threshold: f64,
    engine: ReplayEngine,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(DEFAULT_REWARD_THRESHOLD)
    }
}

impl Verifier {
    pub fn new(reward_threshold: f64) -> Self {
        Self {
            reward_threshold,
            engine: ReplayEngine::new(DEFAULT_REPLAY_EPISODES),
        }
    }

    pub fn with_replay_episodes(mut self, episodes: u32) -> Self {
        self.engine = ReplayEngine::new(episodes);
        self
    }

    pub fn reward_threshold(&self) -> f64 {
        self.reward_threshold
    }

    pub fn replay_engine(&self) -> &ReplayEngine {
        &self.engine
    }

    /// Verify a claim. Never fails: rejection is an Invalid result.
    pub fn verify(&self, claim: &PolicyClaim) -> VerificationResult {
        let result = self.evaluate(claim);
        match result.rejection {
            None => info!(
                agent_id = %result.agent_id,
                policy_hash = %hash_prefix(&result.policy_hash),
                verified_reward = ?result.verified_reward,
                "claim verified"
            ),
            Some(rejection) => warn!(
                agent_id = %result.agent_id,
                policy_hash = %hash_prefix(&result.policy_hash),
                rejection = rejection.as_str(),
                reason = %result.reason,
                "claim rejected"
            ),
        }
        result
    }

    fn evaluate(&self, claim: &PolicyClaim) -> VerificationResult {
        if sha256_hex(&claim.policy_artifact) != claim.policy_hash {
            return VerificationResult::invalid(
                claim,
                Rejection::HashMismatch,
                None,
                "Policy artifact does not match claimed hash (hash mismatch).".to_string(),
            );
        }

        let artifact = match PolicyArtifact::from_bytes(&claim.policy_artifact) {
            Ok(a) => a,
            Err(e) => {
                return VerificationResult::invalid(
                    claim,
                    Rejection::MalformedArtifact,
                    None,
                    format!("Policy cannot be replayed: {e}"),
                )
            }
        };

        let verified = match self.engine.replay(&claim.env_id, &artifact) {
            Ok(outcome) => outcome.average_reward,
            Err(e) => {
                return VerificationResult::invalid(
                    claim,
                    Rejection::ReplayFailed,
                    None,
                    format!("Replay failed: {e}"),
                )
            }
        };

        let diff = (claim.claimed_reward - verified).abs();
        // NaN never satisfies the comparison, so a NaN claim is rejected.
        if diff <= self.reward_threshold {
            VerificationResult {
                agent_id: claim.agent_id.clone(),
                policy_hash: claim.policy_hash.clone(),
                verified_reward: Some(verified),
                status: VerificationStatus::Valid,
                reason: format!(
                    "Claimed reward reproducible under deterministic replay. Difference: {diff:.6}"
                ),
                rejection: None,
            }
        } else {
            VerificationResult::invalid(
                claim,
                Rejection::RewardMismatch,
                Some(verified),
                format!(
                    "Claimed reward not reproducible under deterministic replay. \
                     Claimed: {:.6}, Verified: {:.6}, Difference: {:.6}",
                    claim.claimed_reward, verified, diff
                ),
            )
        }
    }

    /// Replay the claim `num_runs` times and require bit-identical rewards.
    pub fn verify_determinism(
        &self,
        claim: &PolicyClaim,
        num_runs: u32,
    ) -> Result<DeterminismReport, DeterminismFault> {
        if num_runs == 0 {
            return Err(DeterminismFault::NoRuns);
        }

        let not_replayable = |reason: String| DeterminismFault::NotReplayable {
            agent_id: claim.agent_id.clone(),
            reason,
        };

        if sha256_hex(&claim.policy_artifact) != claim.policy_hash {
            return Err(not_replayable("hash mismatch".to_string()));
        }
        let artifact =
            PolicyArtifact::from_bytes(&claim.policy_artifact).map_err(|e| not_replayable(e.to_string()))?;

        let mut expected: Option<f64> = None;
        for run in 0..num_runs {
            let reward = self
                .engine
                .replay(&claim.env_id, &artifact)
                .map_err(|e| not_replayable(e.to_string()))?
                .average_reward;

            match expected {
                None => expected = Some(reward),
                Some(first) if first.to_bits() != reward.to_bits() => {
                    let fault = DeterminismFault::Diverged {
                        policy_hash: claim.policy_hash.clone(),
                        run,
                        expected: first,
                        observed: reward,
                    };
                    error!(error = %fault, "determinism check failed");
                    return Err(fault);
                }
                Some(_) => {}
            }
        }

        Ok(DeterminismReport {
            runs: num_runs,
            reward: expected.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::types::{Action, State};

    fn honest_claim() -> PolicyClaim {
        let mut t = BTreeMap::new();
        for s in State::all() {
            t.insert(s, if s.attack_severity == 2 { Action::BlockIp } else { Action::Monitor });
        }
        let artifact = PolicyArtifact::new(t).unwrap();
        let env_id = "env_seed_42_horizon_24";
        let reward = ReplayEngine::default().replay(env_id, &artifact).unwrap().average_reward;
        PolicyClaim {
            agent_id: "agent_a".to_string(),
            env_id: env_id.to_string(),
            policy_hash: artifact.hash().to_string(),
            policy_artifact: artifact.to_bytes(),
            claimed_reward: reward,
        }
    }

    #[test]
    fn honest_claim_is_valid() {
        let claim = honest_claim();
        let r = Verifier::default().verify(&claim);
        assert!(r.is_valid(), "{}", r.reason);
        assert_eq!(r.rejection, None);
        assert_eq!(r.verified_reward, Some(claim.claimed_reward));
    }

    #[test]
    fn nan_claim_is_rejected() {
        let claim = honest_claim().with_claimed_reward(f64::NAN);
        let r = Verifier::default().verify(&claim);
        assert_eq!(r.rejection, Some(Rejection::RewardMismatch));
    }

    #[test]
    fn empty_artifact_with_matching_hash_is_malformed() {
        let bytes = b"{}".to_vec();
        let claim = PolicyClaim {
            policy_hash: sha256_hex(&bytes),
            policy_artifact: bytes,
            ..honest_claim()
        };
        let r = Verifier::default().verify(&claim);
        assert_eq!(r.status, VerificationStatus::Invalid);
        assert_eq!(r.rejection, Some(Rejection::MalformedArtifact));
        assert!(r.reason.contains("cannot be replayed"));
        assert_eq!(r.verified_reward, None);
    }

    #[test]
    fn bad_env_id_is_replay_failure() {
        let claim = PolicyClaim {
            env_id: "env_seed_42".to_string(),
            ..honest_claim()
        };
        let r = Verifier::default().verify(&claim);
        assert_eq!(r.rejection, Some(Rejection::ReplayFailed));
        assert!(r.reason.contains("Replay failed"));
        assert_eq!(r.verified_reward, None);
    }

    #[test]
    fn determinism_check_passes_and_rejects_zero_runs() {
        let claim = honest_claim();
        let v = Verifier::default();
        let report = v.verify_determinism(&claim, 5).unwrap();
        assert_eq!(report.runs, 5);
        assert_eq!(report.reward, claim.claimed_reward);
        assert_eq!(v.verify_determinism(&claim, 0), Err(DeterminismFault::NoRuns));
    }

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Valid).unwrap(),
            "\"VALID\""
        );
    }
}
