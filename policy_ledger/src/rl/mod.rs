// src/rl/mod.rs
//
// Reinforcement-learning side of the trust pipeline.
//
// - EnvConfig / env ids: the deterministic environment a claim is made on
// - CyberDefenseEnv: seeded cyber-defense simulator
// - Policy / PolicyArtifact: state -> action tables and their canonical bytes
// - ReplayEngine: the one greedy episode loop shared by every caller
// - QLearningTrainer / run_agent: how agents produce claims
//
// Everything here is a pure function of (seed, horizon, profile, policy).

pub mod cyber_env;
pub mod env_id;
pub mod policy;
pub mod presets;
pub mod replay;
pub mod runner;
pub mod trainer;

pub use cyber_env::{CyberDefenseEnv, EnvError, StepResult};
pub use env_id::{AttackProfile, EnvConfig, EnvIdError, DEFAULT_ENV_PREFIX, MAX_HORIZON};
pub use policy::{
    sha256_hex, ArtifactError, FixedActionPolicy, GreedyPolicy, Policy, PolicyArtifact, RandomPolicy,
    UNSEEN_STATE_ACTION,
};
pub use presets::{preset, EnvPreset, UnknownPreset, PRESETS};
pub use replay::{
    run_episode, EpisodeOutcome, ReplayEngine, ReplayError, ReplayOutcome, TerminationReason,
    DEFAULT_REPLAY_EPISODES,
};
pub use runner::{run_agent, RunError};
pub use trainer::{QLearningTrainer, TrainerConfig, TrainingOutcome, TrainingProgress, DEFAULT_TRAINING_EPISODES};
