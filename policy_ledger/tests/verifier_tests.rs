use std::collections::BTreeMap;

use policy_ledger::rl::env_id::{AttackProfile, EnvConfig};
use policy_ledger::rl::policy::PolicyArtifact;
use policy_ledger::rl::replay::ReplayEngine;
use policy_ledger::{Action, PolicyClaim, Rejection, State, VerificationStatus, Verifier};

fn honest_claim(agent: &str) -> PolicyClaim {
    let mut t = BTreeMap::new();
    for s in State::all() {
        let a = if s.attack_severity > 0 { Action::RateLimit } else { Action::Monitor };
        t.insert(s, a);
    }
    let artifact = PolicyArtifact::new(t).unwrap();
    let env_id = EnvConfig::new(42, 24, AttackProfile::Balanced).unwrap().to_env_id();
    let claimed_reward = ReplayEngine::default().replay(&env_id, &artifact).unwrap().average_reward;
    PolicyClaim {
        agent_id: agent.to_string(),
        env_id,
        policy_hash: artifact.hash().to_string(),
        policy_artifact: artifact.to_bytes(),
        claimed_reward,
    }
}

#[test]
fn honest_claim_is_valid() {
    let claim = honest_claim("honest");
    let result = Verifier::default().verify(&claim);
    assert_eq!(result.status, VerificationStatus::Valid);
    assert_eq!(result.verified_reward, Some(claim.claimed_reward));
    assert!(result.rejection.is_none());
}

#[test]
fn inflated_claim_is_invalid_with_true_reward() {
    let honest = honest_claim("liar");
    let inflated = honest.with_claimed_reward(honest.claimed_reward + 10.0);

    let result = Verifier::default().verify(&inflated);
    assert_eq!(result.status, VerificationStatus::Invalid);
    assert_eq!(result.rejection, Some(Rejection::RewardMismatch));
    assert_eq!(result.verified_reward, Some(honest.claimed_reward));
    assert!(result.reason.contains("Difference: 10.000000"), "{}", result.reason);
}

#[test]
fn tampered_artifact_fails_before_replay() {
    let mut claim = honest_claim("tamper");
    let last = claim.policy_artifact.len() - 2;
    claim.policy_artifact[last] = b'0';

    let result = Verifier::default().verify(&claim);
    assert_eq!(result.rejection, Some(Rejection::HashMismatch));
    assert_eq!(result.verified_reward, None);
}

#[test]
fn unparsable_env_id_is_a_replay_failure() {
    let claim = PolicyClaim {
        env_id: "cyber_defense_env_seed_42".to_string(),
        ..honest_claim("bad_env")
    };
    let result = Verifier::default().verify(&claim);
    assert_eq!(result.rejection, Some(Rejection::ReplayFailed));
    assert_eq!(result.verified_reward, None);
}

#[test]
fn well_hashed_garbage_is_malformed() {
    let bytes = br#"{"not a state": 3}"#.to_vec();
    let claim = PolicyClaim {
        agent_id: "garbage".to_string(),
        env_id: "cyber_defense_env_seed_1_horizon_24".to_string(),
        policy_hash: policy_ledger::rl::policy::sha256_hex(&bytes),
        policy_artifact: bytes,
        claimed_reward: 0.0,
    };
    let result = Verifier::default().verify(&claim);
    assert_eq!(result.rejection, Some(Rejection::MalformedArtifact));
}

#[test]
fn threshold_bounds_accepted_difference() {
    let honest = honest_claim("edge");
    let nudged = honest.with_claimed_reward(honest.claimed_reward + 0.5);
    assert!(!Verifier::default().verify(&nudged).is_valid());
    assert!(Verifier::new(1.0).verify(&nudged).is_valid());
}

#[test]
fn determinism_check_passes_for_honest_claim() {
    let claim = honest_claim("det");
    let report = Verifier::default().verify_determinism(&claim, 5).unwrap();
    assert_eq!(report.runs, 5);
    assert_eq!(report.reward.to_bits(), claim.claimed_reward.to_bits());
}
