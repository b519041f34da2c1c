// src/consumer.rs
//
// Policy reuse: load a verified policy by hash and run it with no training,
// next to a naive baseline, on the same environment.
//
// Purely observational. The consumer never trains, modifies or verifies a
// policy. Execution uses the shared episode loop, so a policy behaves here
// exactly as it did under replay.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::artifact_store::{ArtifactStore, StoreError};
use crate::marketplace::BestPolicyReference;
use crate::rl::cyber_env::{CyberDefenseEnv, EnvError, HEALTH_CRITICAL};
use crate::rl::env_id::{AttackProfile, EnvConfig, EnvIdError};
use crate::rl::policy::{FixedActionPolicy, GreedyPolicy, Policy, PolicyArtifact, RandomPolicy};
use crate::rl::replay::run_episode;
use crate::types::Action;

/// Episode horizon used for reuse runs.
pub const DEFAULT_EXECUTION_HORIZON: u32 = 24;

/// Naive comparison strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineKind {
    /// Uniformly random action each step.
    Random,
    IgnoreAll,
    BlockAll,
    MonitorOnly,
}

impl BaselineKind {
    pub const ALL: [BaselineKind; 4] = [
        BaselineKind::Random,
        BaselineKind::IgnoreAll,
        BaselineKind::BlockAll,
        BaselineKind::MonitorOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineKind::Random => "random",
            BaselineKind::IgnoreAll => "ignore_all",
            BaselineKind::BlockAll => "block_all",
            BaselineKind::MonitorOnly => "monitor_only",
        }
    }

    fn policy(&self, seed: u64) -> Box<dyn Policy> {
        match self {
            BaselineKind::Random => Box::new(RandomPolicy::new(seed)),
            BaselineKind::IgnoreAll => Box::new(FixedActionPolicy::new(Action::Ignore)),
            BaselineKind::BlockAll => Box::new(FixedActionPolicy::new(Action::BlockIp)),
            BaselineKind::MonitorOnly => Box::new(FixedActionPolicy::new(Action::Monitor)),
        }
    }
}

impl fmt::Display for BaselineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown baseline {0:?} (expected random, ignore_all, block_all or monitor_only)")]
pub struct UnknownBaseline(pub String);

impl FromStr for BaselineKind {
    type Err = UnknownBaseline;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaselineKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownBaseline(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    EnvConfig(#[from] EnvIdError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("execution requires at least one episode")]
    NoEpisodes,
}

/// Aggregate behaviour over a batch of episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub episodes: u32,
    pub avg_reward: f64,
    /// Share of steps per action (percent), indexed by action code.
    pub action_percentages: [f64; Action::COUNT],
    /// Mean system health (0 healthy .. 2 critical) over decision points.
    pub avg_system_health: f64,
    /// Fraction of episodes that ended without a critical system.
    pub survival_rate: f64,
}

/// Policy vs baseline on identical episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub policy: ExecutionStats,
    pub baseline_kind: BaselineKind,
    pub baseline: ExecutionStats,
    pub improvement_pct: f64,
}

/// Result of reusing a marketplace selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReuseReport {
    pub reference: BestPolicyReference,
    pub policy_reward: f64,
    pub baseline_kind: BaselineKind,
    pub baseline_reward: f64,
    pub improvement_pct: f64,
    pub comparison: Comparison,
}

/// Relative improvement in percent.
///
/// A zero baseline has no scale, so the result is +100 when the policy
/// reward is positive, -100 when negative and 0 when also zero.
pub fn improvement_percentage(policy_reward: f64, baseline_reward: f64) -> f64 {
    if baseline_reward != 0.0 {
        (policy_reward - baseline_reward) / baseline_reward.abs() * 100.0
    } else if policy_reward > 0.0 {
        100.0
    } else if policy_reward < 0.0 {
        -100.0
    } else {
        0.0
    }
}

/// Loads stored policies and executes them.
#[derive(Debug, Clone)]
pub struct Consumer {
    store: ArtifactStore,
    horizon: u32,
    profile: AttackProfile,
}

impl Consumer {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            horizon: DEFAULT_EXECUTION_HORIZON,
            profile: AttackProfile::Balanced,
        }
    }

    pub fn with_horizon(mut self, horizon: u32) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_profile(mut self, profile: AttackProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Run on the horizon and profile of `config`. Seeds stay per call.
    pub fn with_env(self, config: &EnvConfig) -> Self {
        self.with_horizon(config.horizon()).with_profile(config.profile())
    }

    /// Environment recorded with the stored policy, if its metadata has one.
    pub fn verified_env(&self, policy_hash: &str) -> Result<Option<EnvConfig>, ConsumerError> {
        let env_id = self
            .store
            .load_metadata(policy_hash)?
            .and_then(|meta| meta.env_id);
        match env_id {
            Some(id) => Ok(Some(EnvConfig::parse(&id)?)),
            None => Ok(None),
        }
    }

    /// Load a stored policy. NotFound and Corrupted stay distinct.
    pub fn load_policy(&self, policy_hash: &str) -> Result<PolicyArtifact, StoreError> {
        self.store.load(policy_hash)
    }

    /// Run the policy greedily for `episodes` episodes.
    pub fn execute_policy(
        &self,
        policy: &PolicyArtifact,
        episodes: u32,
        seed: u64,
    ) -> Result<ExecutionStats, ConsumerError> {
        self.execute(&mut GreedyPolicy::new(policy), episodes, seed)
    }

    /// Run a baseline strategy on the same environment.
    pub fn execute_baseline(
        &self,
        kind: BaselineKind,
        episodes: u32,
        seed: u64,
    ) -> Result<ExecutionStats, ConsumerError> {
        self.execute(kind.policy(seed).as_mut(), episodes, seed)
    }

    pub fn compare_with_baseline(
        &self,
        policy: &PolicyArtifact,
        kind: BaselineKind,
        episodes: u32,
        seed: u64,
    ) -> Result<Comparison, ConsumerError> {
        let policy_stats = self.execute_policy(policy, episodes, seed)?;
        let baseline_stats = self.execute_baseline(kind, episodes, seed)?;
        let improvement_pct = improvement_percentage(policy_stats.avg_reward, baseline_stats.avg_reward);
        Ok(Comparison {
            policy: policy_stats,
            baseline_kind: kind,
            baseline: baseline_stats,
            improvement_pct,
        })
    }

    /// Load the referenced policy and compare it with a baseline.
    pub fn reuse_best(
        &self,
        reference: &BestPolicyReference,
        kind: BaselineKind,
        episodes: u32,
        seed: u64,
    ) -> Result<ReuseReport, ConsumerError> {
        let policy = self.load_policy(&reference.policy_hash)?;
        let comparison = self.compare_with_baseline(&policy, kind, episodes, seed)?;
        info!(
            agent_id = %reference.agent_id,
            baseline = kind.as_str(),
            policy_reward = comparison.policy.avg_reward,
            baseline_reward = comparison.baseline.avg_reward,
            improvement_pct = comparison.improvement_pct,
            "policy reused"
        );
        Ok(ReuseReport {
            reference: reference.clone(),
            policy_reward: comparison.policy.avg_reward,
            baseline_kind: kind,
            baseline_reward: comparison.baseline.avg_reward,
            improvement_pct: comparison.improvement_pct,
            comparison,
        })
    }

    fn execute(
        &self,
        policy: &mut dyn Policy,
        episodes: u32,
        seed: u64,
    ) -> Result<ExecutionStats, ConsumerError> {
        if episodes == 0 {
            return Err(ConsumerError::NoEpisodes);
        }
        let config = EnvConfig::new(seed, self.horizon, self.profile)?;
        let mut env = CyberDefenseEnv::new(config);

        let mut reward_sum = 0.0;
        let mut action_counts = [0u64; Action::COUNT];
        let mut health_sum = 0u64;
        let mut steps = 0u64;
        let mut survived = 0u32;

        for episode in 0..u64::from(episodes) {
            let outcome = run_episode(&mut env, policy, episode)?;
            reward_sum += outcome.total_reward;
            for (total, n) in action_counts.iter_mut().zip(outcome.action_counts) {
                *total += u64::from(n);
            }
            health_sum += u64::from(outcome.health_sum);
            steps += u64::from(outcome.steps);
            if outcome.final_health != HEALTH_CRITICAL {
                survived += 1;
            }
        }

        let mut action_percentages = [0.0; Action::COUNT];
        if steps > 0 {
            for (pct, n) in action_percentages.iter_mut().zip(action_counts) {
                *pct = n as f64 / steps as f64 * 100.0;
            }
        }

        Ok(ExecutionStats {
            episodes,
            avg_reward: reward_sum / f64::from(episodes),
            action_percentages,
            avg_system_health: if steps > 0 {
                health_sum as f64 / steps as f64
            } else {
                0.0
            },
            survival_rate: f64::from(survived) / f64::from(episodes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_baseline_rule() {
        assert_eq!(improvement_percentage(5.0, 0.0), 100.0);
        assert_eq!(improvement_percentage(-5.0, 0.0), -100.0);
        assert_eq!(improvement_percentage(0.0, 0.0), 0.0);
        assert_eq!(improvement_percentage(15.0, 10.0), 50.0);
        assert_eq!(improvement_percentage(-5.0, -10.0), 50.0);
    }

    #[test]
    fn baseline_names_round_trip() {
        for k in BaselineKind::ALL {
            assert_eq!(k.as_str().parse::<BaselineKind>().unwrap(), k);
        }
        assert!("always_win".parse::<BaselineKind>().is_err());
    }

    #[test]
    fn fixed_baseline_uses_only_its_action() {
        let consumer = Consumer::new(ArtifactStore::new("unused"));
        let stats = consumer.execute_baseline(BaselineKind::BlockAll, 5, 42).unwrap();
        assert_eq!(stats.action_percentages[Action::BlockIp.index()], 100.0);
        assert!((0.0..=1.0).contains(&stats.survival_rate));
    }

    #[test]
    fn execution_is_deterministic_for_a_seed() {
        let consumer = Consumer::new(ArtifactStore::new("unused"));
        let a = consumer.execute_baseline(BaselineKind::Random, 10, 7).unwrap();
        let b = consumer.execute_baseline(BaselineKind::Random, 10, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_episodes_is_an_error() {
        let consumer = Consumer::new(ArtifactStore::new("unused"));
        assert!(matches!(
            consumer.execute_baseline(BaselineKind::IgnoreAll, 0, 1),
            Err(ConsumerError::NoEpisodes)
        ));
    }
}
