// src/rl/runner.rs
//
// Agent run: train -> extract -> replay -> save artifact -> build claim.
//
// The claimed reward is computed with the replay engine the verifier will
// use (same env id, same episode count), so an honest agent's claim
// reproduces bit-for-bit. Callers pass `Verifier::replay_engine()`.

use thiserror::Error;
use tracing::info;

use super::cyber_env::{CyberDefenseEnv, EnvError};
use super::env_id::EnvConfig;
use super::policy::ArtifactError;
use super::replay::{ReplayEngine, ReplayError};
use super::trainer::{QLearningTrainer, TrainerConfig};
use crate::artifact_store::{ArtifactMetadata, ArtifactStore, StoreError};
use crate::claim::{hash_prefix, PolicyClaim};
use crate::session::{SessionStatus, SessionStore, TrainingSession};

/// Sessions are updated every this many training episodes.
const SESSION_PROGRESS_INTERVAL: u32 = 50;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("training failed: {0}")]
    Training(#[from] EnvError),

    #[error("no policy could be extracted: {0}")]
    Extraction(#[from] ArtifactError),

    #[error("replay of the trained policy failed: {0}")]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Train one agent and return its claim.
///
/// `engine` must be the verifier's replay engine; the claimed reward is its
/// average. The artifact is written to `store` before the claim is returned. When a
/// session store is given, the agent's session is created, updated with
/// progress and left in Completed or Failed.
pub fn run_agent(
    agent_id: &str,
    config: &EnvConfig,
    trainer: TrainerConfig,
    engine: &ReplayEngine,
    store: &ArtifactStore,
    sessions: Option<&dyn SessionStore>,
) -> Result<PolicyClaim, RunError> {
    let env_id = config.to_env_id();
    if let Some(s) = sessions {
        s.put(TrainingSession::start(agent_id, &env_id, trainer.episodes));
    }

    let result = train_and_claim(agent_id, config, &env_id, trainer, engine, store, sessions);

    if let Some(s) = sessions {
        s.update(agent_id, &mut |session| match &result {
            Ok(claim) => {
                session.status = SessionStatus::Completed;
                session.policy_hash = Some(claim.policy_hash.clone());
                session.claimed_reward = Some(claim.claimed_reward);
            }
            Err(e) => {
                session.status = SessionStatus::Failed;
                session.error = Some(e.to_string());
            }
        });
    }
    result
}

fn train_and_claim(
    agent_id: &str,
    config: &EnvConfig,
    env_id: &str,
    trainer: TrainerConfig,
    engine: &ReplayEngine,
    store: &ArtifactStore,
    sessions: Option<&dyn SessionStore>,
) -> Result<PolicyClaim, RunError> {
    info!(agent_id, env_id, episodes = trainer.episodes, "training started");

    let mut env = CyberDefenseEnv::new(*config);
    let outcome = QLearningTrainer::new(trainer).train_with_progress(&mut env, |progress| {
        let report = progress.episode % SESSION_PROGRESS_INTERVAL == 0
            || progress.episode == progress.episodes_total;
        if let (Some(s), true) = (sessions, report) {
            s.update(agent_id, &mut |session| {
                session.episodes_done = progress.episode;
                session.last_episode_reward = Some(progress.episode_reward);
            });
        }
    })?;

    let artifact = outcome.extract_policy()?;
    let claimed_reward = engine.replay(env_id, &artifact)?.average_reward;

    let metadata = ArtifactMetadata {
        agent_id: agent_id.to_string(),
        claimed_reward,
        policy_hash: artifact.hash().to_string(),
        env_id: Some(env_id.to_string()),
    };
    store.save(&artifact, &metadata)?;

    info!(
        agent_id,
        policy_hash = %hash_prefix(artifact.hash()),
        states = artifact.len(),
        training_average_reward = outcome.training_average_reward,
        claimed_reward,
        "training finished"
    );

    Ok(PolicyClaim {
        agent_id: agent_id.to_string(),
        env_id: env_id.to_string(),
        policy_hash: artifact.hash().to_string(),
        policy_artifact: artifact.to_bytes(),
        claimed_reward,
    })
}
