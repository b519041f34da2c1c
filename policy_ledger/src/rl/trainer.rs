// src/rl/trainer.rs
//
// Tabular Q-learning over the cyber-defense environment.
//
//   Q(s,a) <- Q(s,a) + alpha * (r + gamma * max_a' Q(s',a') - Q(s,a))
//
// Exploration is epsilon-greedy with exponential per-episode decay, driven by
// a ChaCha8 RNG seeded from the training seed, so a training run is
// reproducible end to end. Training quality is not the point here; the
// output only has to be a deterministic table whose greedy reward can be
// claimed and replayed.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::types::{Action, State};

use super::cyber_env::{CyberDefenseEnv, EnvError};
use super::policy::{ArtifactError, PolicyArtifact};

/// Default number of training episodes.
pub const DEFAULT_TRAINING_EPISODES: u32 = 2000;

/// Q-learning hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub episodes: u32,
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon_start: f64,
    pub epsilon_end: f64,
    pub epsilon_decay: f64,
    /// Seed for the exploration RNG.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            episodes: DEFAULT_TRAINING_EPISODES,
            alpha: 0.5,
            gamma: 0.95,
            epsilon_start: 1.0,
            epsilon_end: 0.01,
            epsilon_decay: 0.995,
            seed: 0,
        }
    }
}

impl TrainerConfig {
    pub fn with_episodes(mut self, episodes: u32) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Progress report emitted after every training episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingProgress {
    pub episode: u32,
    pub episodes_total: u32,
    pub episode_reward: f64,
    pub epsilon: f64,
}

/// Q-values per visited state, indexed by action code.
pub type QTable = BTreeMap<State, [f64; Action::COUNT]>;

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub q_table: QTable,
    /// Mean episode reward during training (exploration included).
    pub training_average_reward: f64,
    pub episodes_trained: u32,
}

impl TrainingOutcome {
    /// Greedy policy over every visited state. Ties go to the lowest code.
    pub fn extract_policy(&self) -> Result<PolicyArtifact, ArtifactError> {
        PolicyArtifact::new(extract_greedy(&self.q_table))
    }
}

/// Arg-max action per state; ties resolve to the lowest action code.
pub fn extract_greedy(q_table: &QTable) -> BTreeMap<State, Action> {
    q_table
        .iter()
        .map(|(state, q)| (*state, argmax(q)))
        .collect()
}

fn argmax(q: &[f64; Action::COUNT]) -> Action {
    let mut best = 0usize;
    for i in 1..Action::COUNT {
        if q[i] > q[best] {
            best = i;
        }
    }
    Action::ALL[best]
}

pub struct QLearningTrainer {
    config: TrainerConfig,
    rng: ChaCha8Rng,
    q_table: QTable,
}

impl QLearningTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            q_table: QTable::new(),
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train for the configured number of episodes.
    pub fn train(self, env: &mut CyberDefenseEnv) -> Result<TrainingOutcome, EnvError> {
        self.train_with_progress(env, |_| {})
    }

    /// Train, reporting progress after each episode.
    pub fn train_with_progress<F>(
        mut self,
        env: &mut CyberDefenseEnv,
        mut on_episode: F,
    ) -> Result<TrainingOutcome, EnvError>
    where
        F: FnMut(TrainingProgress),
    {
        let mut epsilon = self.config.epsilon_start;
        let mut reward_sum = 0.0;

        for episode in 0..self.config.episodes {
            let episode_reward = self.train_episode(env, u64::from(episode), epsilon)?;
            reward_sum += episode_reward;
            on_episode(TrainingProgress {
                episode: episode + 1,
                episodes_total: self.config.episodes,
                episode_reward,
                epsilon,
            });
            epsilon = (epsilon * self.config.epsilon_decay).max(self.config.epsilon_end);
        }

        let training_average_reward = if self.config.episodes == 0 {
            0.0
        } else {
            reward_sum / f64::from(self.config.episodes)
        };

        Ok(TrainingOutcome {
            q_table: self.q_table,
            training_average_reward,
            episodes_trained: self.config.episodes,
        })
    }

    fn train_episode(
        &mut self,
        env: &mut CyberDefenseEnv,
        episode: u64,
        epsilon: f64,
    ) -> Result<f64, EnvError> {
        let step_cap = env.config().step_cap();
        let mut state = env.reset(episode);
        let mut total = 0.0;

        for _ in 0..step_cap {
            let action = self.select_action(&state, epsilon);
            let result = env.step(action)?;
            self.update(&state, action, result.reward, &result.observation, result.done);
            total += result.reward;
            state = result.observation;
            if result.done {
                break;
            }
        }
        Ok(total)
    }

    fn select_action(&mut self, state: &State, epsilon: f64) -> Action {
        if self.rng.gen::<f64>() < epsilon {
            return Action::ALL[self.rng.gen_range(0..Action::COUNT)];
        }
        match self.q_table.get(state) {
            Some(q) => argmax(q),
            None => Action::ALL[self.rng.gen_range(0..Action::COUNT)],
        }
    }

    fn update(&mut self, state: &State, action: Action, reward: f64, next: &State, done: bool) {
        let max_next = if done {
            0.0
        } else {
            self.q_table
                .get(next)
                .map(|q| q.iter().copied().fold(f64::NEG_INFINITY, f64::max))
                .unwrap_or(0.0)
        };
        let alpha = self.config.alpha;
        let gamma = self.config.gamma;
        let q = self.q_table.entry(*state).or_insert([0.0; Action::COUNT]);
        let current = q[action.index()];
        q[action.index()] = current + alpha * (reward + gamma * max_next - current);
    }
}
