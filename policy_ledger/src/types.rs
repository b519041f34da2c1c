// src/types.rs
//
// Common shared types for the policy ledger.
//
// - Action: closed set of defensive actions (integer codes 0..=4)
// - State:  fixed-arity discretised observation with bounded coordinates
//
// The canonical text form of a State ("(a, b, c, d, e)") is only used at the
// serialization boundary; parsing goes through `State::parse_key`, never
// through any generic evaluation of the key string.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of coordinates in a discretised state.
pub const STATE_ARITY: usize = 5;

/// Inclusive upper bound of each state coordinate, in field order.
pub const STATE_BOUNDS: [u8; STATE_ARITY] = [2, 2, 2, 1, 1];

/// Coordinate names, in field order (used in error messages).
pub const STATE_FIELDS: [&str; STATE_ARITY] = [
    "attack_severity",
    "attack_type",
    "system_health",
    "alert_confidence",
    "time_under_attack",
];

/// Defensive action chosen by a policy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// No action taken.
    Ignore = 0,
    /// Enhanced logging and observation.
    Monitor = 1,
    /// Throttle suspicious traffic.
    RateLimit = 2,
    /// Block suspected source addresses.
    BlockIp = 3,
    /// Quarantine the affected service.
    IsolateService = 4,
}

impl Action {
    /// Number of actions in the closed action set.
    pub const COUNT: usize = 5;

    /// All actions, ordered by code.
    pub const ALL: [Action; Action::COUNT] = [
        Action::Ignore,
        Action::Monitor,
        Action::RateLimit,
        Action::BlockIp,
        Action::IsolateService,
    ];

    /// Integer code used in serialized artifacts.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Array index (same as the code).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up an action by integer code. Returns None outside 0..=4.
    pub fn from_code(code: u64) -> Option<Action> {
        match code {
            0 => Some(Action::Ignore),
            1 => Some(Action::Monitor),
            2 => Some(Action::RateLimit),
            3 => Some(Action::BlockIp),
            4 => Some(Action::IsolateService),
            _ => None,
        }
    }

    /// Stable lowercase name (used in logs and reports).
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Ignore => "ignore",
            Action::Monitor => "monitor",
            Action::RateLimit => "rate_limit",
            Action::BlockIp => "block_ip",
            Action::IsolateService => "isolate_service",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced when building or parsing a State.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("state key {key:?} is not a parenthesised tuple")]
    NotATuple { key: String },

    #[error("state key {key:?} has {found} coordinates, expected {}", STATE_ARITY)]
    WrongArity { key: String, found: usize },

    #[error("state key {key:?} has non-integer coordinate {token:?}")]
    NotAnInteger { key: String, token: String },

    #[error("state coordinate {field}={value} out of range 0..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u8,
    },
}

/// Discretised observation of the defense environment.
///
/// Field order defines both the canonical tuple order and the derived `Ord`,
/// so sorting states sorts them lexicographically by coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct State {
    /// LOW (0) | MEDIUM (1) | HIGH (2)
    pub attack_severity: u8,
    /// SCAN (0) | BRUTE_FORCE (1) | DOS (2)
    pub attack_type: u8,
    /// HEALTHY (0) | DEGRADED (1) | CRITICAL (2)
    pub system_health: u8,
    /// LOW (0) | HIGH (1)
    pub alert_confidence: u8,
    /// SHORT (0) | LONG (1)
    pub time_under_attack: u8,
}

impl State {
    /// Build a state from coordinates, validating each bound.
    pub fn new(coords: [u64; STATE_ARITY]) -> Result<State, StateError> {
        for (i, &value) in coords.iter().enumerate() {
            if value > u64::from(STATE_BOUNDS[i]) {
                return Err(StateError::OutOfRange {
                    field: STATE_FIELDS[i],
                    value,
                    max: STATE_BOUNDS[i],
                });
            }
        }
        // Bounds checked above, so every coordinate fits in u8.
        Ok(State {
            attack_severity: coords[0] as u8,
            attack_type: coords[1] as u8,
            system_health: coords[2] as u8,
            alert_confidence: coords[3] as u8,
            time_under_attack: coords[4] as u8,
        })
    }

    /// Coordinates in canonical order.
    pub fn coords(&self) -> [u8; STATE_ARITY] {
        [
            self.attack_severity,
            self.attack_type,
            self.system_health,
            self.alert_confidence,
            self.time_under_attack,
        ]
    }

    /// Canonical text form: `"(a, b, c, d, e)"`.
    pub fn canonical_key(&self) -> String {
        let c = self.coords();
        format!("({}, {}, {}, {}, {})", c[0], c[1], c[2], c[3], c[4])
    }

    /// Parse the canonical text form.
    ///
    /// Accepts surrounding whitespace and any whitespace around coordinates,
    /// but requires parentheses, exactly five comma-separated unsigned
    /// integers, and in-range values.
    pub fn parse_key(key: &str) -> Result<State, StateError> {
        let trimmed = key.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| StateError::NotATuple {
                key: key.to_string(),
            })?;

        let tokens: Vec<&str> = inner.split(',').map(str::trim).collect();
        if tokens.len() != STATE_ARITY {
            return Err(StateError::WrongArity {
                key: key.to_string(),
                found: tokens.len(),
            });
        }

        let mut coords = [0u64; STATE_ARITY];
        for (i, token) in tokens.iter().enumerate() {
            if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
                return Err(StateError::NotAnInteger {
                    key: key.to_string(),
                    token: token.to_string(),
                });
            }
            coords[i] = token.parse::<u64>().map_err(|_| StateError::NotAnInteger {
                key: key.to_string(),
                token: token.to_string(),
            })?;
        }

        State::new(coords)
    }

    /// Enumerate every state in the bounded state space, in canonical order.
    pub fn all() -> Vec<State> {
        let mut out = Vec::new();
        for a in 0..=STATE_BOUNDS[0] {
            for b in 0..=STATE_BOUNDS[1] {
                for c in 0..=STATE_BOUNDS[2] {
                    for d in 0..=STATE_BOUNDS[3] {
                        for e in 0..=STATE_BOUNDS[4] {
                            out.push(State {
                                attack_severity: a,
                                attack_type: b,
                                system_health: c,
                                alert_confidence: d,
                                time_under_attack: e,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_key())
    }
}
