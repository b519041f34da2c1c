// src/rl/replay.rs
//
// Deterministic replay.
//
// `run_episode` is the one episode loop in the crate: training-time
// evaluation, verification replay and consumer execution all call it.
//
//   reset -> observe -> act -> step -> accumulate
//
// until the environment signals done or the 2x horizon step cap is hit.
// Replay averages total reward over a fixed number of episodes (0..n), each
// on its own dynamics stream, so the result is a pure function of
// (env config, policy).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Action;

use super::cyber_env::{CyberDefenseEnv, EnvError, HEALTH_CRITICAL};
use super::env_id::{EnvConfig, EnvIdError};
use super::policy::{GreedyPolicy, Policy, PolicyArtifact};

/// Episodes averaged by a verification replay.
pub const DEFAULT_REPLAY_EPISODES: u32 = 20;

/// Episode termination reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Horizon reached.
    EndOfEpisode,
    /// System health went critical.
    Compromised,
    /// Safety step cap reached before the environment signalled done.
    StepCap,
}

/// Summary of one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub episode: u64,
    pub total_reward: f64,
    pub steps: u32,
    /// Times each action was taken, indexed by action code.
    pub action_counts: [u32; Action::COUNT],
    /// Sum of observed system health over decision points.
    pub health_sum: u32,
    pub final_health: u8,
    pub termination: TerminationReason,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("invalid environment id: {0}")]
    EnvId(#[from] EnvIdError),

    #[error("environment error: {0}")]
    Env(#[from] EnvError),

    #[error("replay requires at least one episode")]
    NoEpisodes,
}

/// Run one episode of `policy` in `env`.
pub fn run_episode(
    env: &mut CyberDefenseEnv,
    policy: &mut dyn Policy,
    episode: u64,
) -> Result<EpisodeOutcome, EnvError> {
    let step_cap = env.config().step_cap();
    policy.reset_episode(env.config().seed(), episode);
    let mut state = env.reset(episode);

    let mut total_reward = 0.0;
    let mut steps = 0u32;
    let mut action_counts = [0u32; Action::COUNT];
    let mut health_sum = 0u32;
    let mut done = false;

    while steps < step_cap {
        health_sum += u32::from(state.system_health);
        let action = policy.act(&state);
        let result = env.step(action)?;
        action_counts[action.index()] += 1;
        total_reward += result.reward;
        steps += 1;
        state = result.observation;
        if result.done {
            done = true;
            break;
        }
    }

    let final_health = env.system_health();
    let termination = if !done {
        TerminationReason::StepCap
    } else if final_health == HEALTH_CRITICAL {
        TerminationReason::Compromised
    } else {
        TerminationReason::EndOfEpisode
    };

    Ok(EpisodeOutcome {
        episode,
        total_reward,
        steps,
        action_counts,
        health_sum,
        final_health,
        termination,
    })
}

/// Averaged result of a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub env_id: String,
    pub average_reward: f64,
    pub episode_rewards: Vec<f64>,
}

/// Greedy multi-episode replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayEngine {
    episodes: u32,
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self {
            episodes: DEFAULT_REPLAY_EPISODES,
        }
    }
}

impl ReplayEngine {
    pub fn new(episodes: u32) -> Self {
        Self { episodes }
    }

    pub fn episodes(&self) -> u32 {
        self.episodes
    }

    /// Parse `env_id` and replay the artifact greedily.
    pub fn replay(&self, env_id: &str, artifact: &PolicyArtifact) -> Result<ReplayOutcome, ReplayError> {
        let config = EnvConfig::parse(env_id)?;
        self.replay_config(&config, &mut GreedyPolicy::new(artifact))
    }

    /// Replay any policy on an already-parsed config.
    pub fn replay_config(
        &self,
        config: &EnvConfig,
        policy: &mut dyn Policy,
    ) -> Result<ReplayOutcome, ReplayError> {
        if self.episodes == 0 {
            return Err(ReplayError::NoEpisodes);
        }

        let mut env = CyberDefenseEnv::new(*config);
        let mut episode_rewards = Vec::with_capacity(self.episodes as usize);
        for episode in 0..u64::from(self.episodes) {
            let outcome = run_episode(&mut env, policy, episode)?;
            episode_rewards.push(outcome.total_reward);
        }

        // Summed in episode order so the float result is reproducible.
        let total: f64 = episode_rewards.iter().sum();
        let average_reward = total / f64::from(self.episodes);

        Ok(ReplayOutcome {
            env_id: config.to_env_id(),
            average_reward,
            episode_rewards,
        })
    }
}
