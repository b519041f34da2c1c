// src/session.rs
//
// Training session registry.
//
// Sessions are keyed by agent id and owned by an explicit store passed to
// whoever runs training; there is no process-wide registry. Agents never
// read each other's sessions through the trust pipeline, and removal is the
// caller's decision (`remove` once a session is no longer needed).

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

/// Progress and outcome of one agent's training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSession {
    pub agent_id: String,
    pub env_id: String,
    pub status: SessionStatus,
    pub episodes_done: u32,
    pub episodes_total: u32,
    pub last_episode_reward: Option<f64>,
    pub policy_hash: Option<String>,
    pub claimed_reward: Option<f64>,
    pub error: Option<String>,
}

impl TrainingSession {
    pub fn start(agent_id: &str, env_id: &str, episodes_total: u32) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            env_id: env_id.to_string(),
            status: SessionStatus::Running,
            episodes_done: 0,
            episodes_total,
            last_episode_reward: None,
            policy_hash: None,
            claimed_reward: None,
            error: None,
        }
    }
}

/// Storage for training sessions.
pub trait SessionStore: Send + Sync {
    fn get(&self, agent_id: &str) -> Option<TrainingSession>;

    /// Insert or replace the session for `session.agent_id`.
    fn put(&self, session: TrainingSession);

    /// All sessions, ordered by agent id.
    fn list(&self) -> Vec<TrainingSession>;

    fn remove(&self, agent_id: &str) -> Option<TrainingSession>;

    /// Read-modify-write helper. Returns false if the session is absent.
    fn update(&self, agent_id: &str, f: &mut dyn FnMut(&mut TrainingSession)) -> bool {
        match self.get(agent_id) {
            Some(mut session) => {
                f(&mut session);
                self.put(session);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<BTreeMap<String, TrainingSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, agent_id: &str) -> Option<TrainingSession> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(agent_id)
            .cloned()
    }

    fn put(&self, session: TrainingSession) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.agent_id.clone(), session);
    }

    fn list(&self) -> Vec<TrainingSession> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn remove(&self, agent_id: &str) -> Option<TrainingSession> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(agent_id)
    }

    fn update(&self, agent_id: &str, f: &mut dyn FnMut(&mut TrainingSession)) -> bool {
        // Single write lock so concurrent updates to one session do not interleave.
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.get_mut(agent_id) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_list_remove() {
        let store = InMemorySessionStore::new();
        store.put(TrainingSession::start("b", "env_seed_1_horizon_24", 10));
        store.put(TrainingSession::start("a", "env_seed_2_horizon_24", 10));

        assert_eq!(store.get("a").unwrap().env_id, "env_seed_2_horizon_24");
        let ids: Vec<_> = store.list().into_iter().map(|s| s.agent_id).collect();
        assert_eq!(ids, ["a", "b"]);

        assert!(store.remove("a").is_some());
        assert!(store.get("a").is_none());
        assert!(store.remove("a").is_none());
    }

    #[test]
    fn update_mutates_in_place() {
        let store = InMemorySessionStore::new();
        store.put(TrainingSession::start("a", "e", 3));
        assert!(store.update("a", &mut |s| {
            s.episodes_done = 3;
            s.status = SessionStatus::Completed;
        }));
        let s = store.get("a").unwrap();
        assert_eq!(s.episodes_done, 3);
        assert!(s.status.is_terminal());
        assert!(!store.update("missing", &mut |_| {}));
    }
}
