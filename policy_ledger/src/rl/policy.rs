// src/rl/policy.rs
//
// Policy interface and the policy artifact.
//
// A PolicyArtifact is the deterministic state -> action table produced by
// training. Its canonical byte form is a compact JSON object with sorted
// string keys ("(a, b, c, d, e)") and integer action codes; the SHA-256 of
// those bytes is the policy hash.
//
// Lookups for states the table does not cover fall back to
// UNSEEN_STATE_ACTION. Training evaluation, verification replay and
// consumer execution all go through `PolicyArtifact::action_for`, so there
// is exactly one default.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::{Action, State, StateError};

/// Action applied when a policy has no entry for the observed state.
pub const UNSEEN_STATE_ACTION: Action = Action::Ignore;

/// Version tag of the greedy table policy.
pub const TABLE_POLICY_VERSION: &str = "table-greedy-v1";

/// Policy trait: anything that maps an observation to an action.
pub trait Policy: Send {
    /// Unique version string for this policy implementation.
    fn version(&self) -> &str;

    /// Optional policy ID (e.g. the artifact hash).
    fn policy_id(&self) -> Option<&str> {
        None
    }

    /// Choose an action for the current observation.
    fn act(&mut self, state: &State) -> Action;

    /// Called at the start of each episode.
    fn reset_episode(&mut self, _seed: u64, _episode: u64) {}
}

/// Hex SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Errors raised while loading an artifact from bytes or JSON.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("artifact payload is a {found}, expected a state -> action mapping")]
    NotAMapping { found: &'static str },

    #[error("artifact mapping is empty")]
    Empty,

    #[error("invalid state key: {0}")]
    InvalidState(#[from] StateError),

    #[error("state {key:?} has invalid action {value}; expected an integer in 0..={}", Action::COUNT - 1)]
    InvalidAction { key: String, value: String },

    #[error("state {key:?} appears more than once")]
    DuplicateState { key: String },
}

/// Deterministic state -> action table. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyArtifact {
    table: BTreeMap<State, Action>,
    hash: String,
}

impl PolicyArtifact {
    /// Build from a table. An empty table is rejected.
    pub fn new(table: BTreeMap<State, Action>) -> Result<Self, ArtifactError> {
        if table.is_empty() {
            return Err(ArtifactError::Empty);
        }
        let hash = sha256_hex(&canonical_bytes(&table));
        Ok(Self { table, hash })
    }

    /// Structural load from raw artifact bytes (a bare JSON mapping).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_json(&value)
    }

    /// Structural load from an already-parsed JSON value.
    pub fn from_json(value: &Value) -> Result<Self, ArtifactError> {
        let object = value.as_object().ok_or(ArtifactError::NotAMapping {
            found: json_kind(value),
        })?;

        let mut table = BTreeMap::new();
        for (key, raw) in object {
            let state = State::parse_key(key)?;
            let action = raw
                .as_u64()
                .and_then(Action::from_code)
                .ok_or_else(|| ArtifactError::InvalidAction {
                    key: key.clone(),
                    value: raw.to_string(),
                })?;
            if table.insert(state, action).is_some() {
                return Err(ArtifactError::DuplicateState { key: key.clone() });
            }
        }
        Self::new(table)
    }

    /// Canonical serialized form; identical tables give identical bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        canonical_bytes(&self.table)
    }

    /// The table as a JSON object with canonical string keys.
    pub fn to_json(&self) -> Value {
        Value::Object(canonical_object(&self.table))
    }

    /// Hex SHA-256 of the canonical bytes.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Explicit entry for `state`, if any.
    pub fn get(&self, state: &State) -> Option<Action> {
        self.table.get(state).copied()
    }

    /// Greedy lookup with the shared unseen-state default.
    pub fn action_for(&self, state: &State) -> Action {
        self.get(state).unwrap_or(UNSEEN_STATE_ACTION)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True for a table with no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&State, &Action)> {
        self.table.iter()
    }

    pub fn table(&self) -> &BTreeMap<State, Action> {
        &self.table
    }
}

impl Policy for PolicyArtifact {
    fn version(&self) -> &str {
        TABLE_POLICY_VERSION
    }

    fn policy_id(&self) -> Option<&str> {
        Some(&self.hash)
    }

    fn act(&mut self, state: &State) -> Action {
        self.action_for(state)
    }
}

/// Borrowed greedy view of an artifact, for callers that must not clone it.
pub struct GreedyPolicy<'a> {
    artifact: &'a PolicyArtifact,
}

impl<'a> GreedyPolicy<'a> {
    pub fn new(artifact: &'a PolicyArtifact) -> Self {
        Self { artifact }
    }
}

impl Policy for GreedyPolicy<'_> {
    fn version(&self) -> &str {
        TABLE_POLICY_VERSION
    }

    fn policy_id(&self) -> Option<&str> {
        Some(self.artifact.hash())
    }

    fn act(&mut self, state: &State) -> Action {
        self.artifact.action_for(state)
    }
}

/// Baseline: always take the same action.
#[derive(Debug, Clone, Copy)]
pub struct FixedActionPolicy {
    action: Action,
}

impl FixedActionPolicy {
    pub fn new(action: Action) -> Self {
        Self { action }
    }
}

impl Policy for FixedActionPolicy {
    fn version(&self) -> &str {
        "fixed-action-v1"
    }

    fn act(&mut self, _state: &State) -> Action {
        self.action
    }
}

/// Baseline: uniformly random action, reproducible per (seed, episode).
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn version(&self) -> &str {
        "random-uniform-v1"
    }

    fn act(&mut self, _state: &State) -> Action {
        Action::ALL[self.rng.gen_range(0..Action::COUNT)]
    }

    fn reset_episode(&mut self, seed: u64, episode: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.rng.set_stream(episode.wrapping_add(1));
    }
}

fn canonical_object(table: &BTreeMap<State, Action>) -> Map<String, Value> {
    // serde_json's default Map is ordered by key.
    table
        .iter()
        .map(|(state, action)| (state.canonical_key(), Value::from(action.code())))
        .collect()
}

fn canonical_bytes(table: &BTreeMap<State, Action>) -> Vec<u8> {
    Value::Object(canonical_object(table)).to_string().into_bytes()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
