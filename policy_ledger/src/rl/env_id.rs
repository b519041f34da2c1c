// src/rl/env_id.rs
//
// Environment configuration and its string identifier.
//
// Identifier format:
//
//   <prefix>_seed_<u64>_horizon_<u32>[_profile_<name>]
//
// e.g. "cyber_defense_env_seed_42_horizon_24" or
//      "env_seed_300_horizon_24_profile_highpressure".
//
// The parser is strict: anything it cannot account for is an error. The only
// implicit value is the attack profile, whose canonical form omits
// "_profile_balanced".

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted episode horizon.
pub const MAX_HORIZON: u32 = 10_000;

/// Default prefix used when formatting identifiers.
pub const DEFAULT_ENV_PREFIX: &str = "cyber_defense_env";

/// Attack mix of the simulated scenario (difficulty parameter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackProfile {
    /// Mostly low severity, occasional high-severity bursts.
    #[default]
    Balanced,
    /// Frequent high-severity attacks.
    HighPressure,
    /// Rare but critical attacks.
    Sparse,
}

impl AttackProfile {
    /// Identifier token (no underscores, so it survives `_`-splitting).
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackProfile::Balanced => "balanced",
            AttackProfile::HighPressure => "highpressure",
            AttackProfile::Sparse => "sparse",
        }
    }

    /// Parse an identifier token. Returns None if unrecognized.
    pub fn parse(s: &str) -> Option<AttackProfile> {
        match s {
            "balanced" => Some(AttackProfile::Balanced),
            "highpressure" => Some(AttackProfile::HighPressure),
            "sparse" => Some(AttackProfile::Sparse),
            _ => None,
        }
    }

    /// Sampling weights for attack severity LOW / MEDIUM / HIGH.
    pub fn severity_weights(&self) -> [f64; 3] {
        match self {
            AttackProfile::Balanced => [0.5, 0.3, 0.2],
            AttackProfile::HighPressure => [0.2, 0.3, 0.5],
            AttackProfile::Sparse => [0.8, 0.15, 0.05],
        }
    }
}

/// Errors from building or parsing an environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvIdError {
    #[error("invalid environment id {env_id:?}: {message}")]
    Malformed { env_id: String, message: String },

    #[error("invalid horizon {horizon}: must be in 1..={}", MAX_HORIZON)]
    HorizonOutOfRange { horizon: u64 },

    #[error("unknown attack profile {name:?}")]
    UnknownProfile { name: String },
}

/// Fully-specified, validated environment configuration.
///
/// Fields are private so every instance has passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvConfig {
    seed: u64,
    horizon: u32,
    profile: AttackProfile,
}

impl EnvConfig {
    /// Build a configuration, validating the horizon.
    pub fn new(seed: u64, horizon: u32, profile: AttackProfile) -> Result<EnvConfig, EnvIdError> {
        if horizon == 0 || horizon > MAX_HORIZON {
            return Err(EnvIdError::HorizonOutOfRange {
                horizon: u64::from(horizon),
            });
        }
        Ok(EnvConfig {
            seed,
            horizon,
            profile,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    pub fn profile(&self) -> AttackProfile {
        self.profile
    }

    /// Hard per-episode step cap (2x horizon).
    pub fn step_cap(&self) -> u32 {
        self.horizon.saturating_mul(2)
    }

    /// Canonical identifier using the default prefix.
    pub fn to_env_id(&self) -> String {
        self.to_env_id_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Canonical identifier with a caller-chosen prefix.
    pub fn to_env_id_with_prefix(&self, prefix: &str) -> String {
        let mut id = format!("{}_seed_{}_horizon_{}", prefix, self.seed, self.horizon);
        if self.profile != AttackProfile::Balanced {
            id.push_str("_profile_");
            id.push_str(self.profile.as_str());
        }
        id
    }

    /// Parse an identifier string.
    pub fn parse(env_id: &str) -> Result<EnvConfig, EnvIdError> {
        let malformed = |message: &str| EnvIdError::Malformed {
            env_id: env_id.to_string(),
            message: message.to_string(),
        };

        let tokens: Vec<&str> = env_id.split('_').collect();

        let seed_positions: Vec<usize> = positions(&tokens, "seed");
        let horizon_positions: Vec<usize> = positions(&tokens, "horizon");
        if seed_positions.len() != 1 {
            return Err(malformed("expected exactly one 'seed' token"));
        }
        if horizon_positions.len() != 1 {
            return Err(malformed("expected exactly one 'horizon' token"));
        }

        let seed_at = seed_positions[0];
        if seed_at == 0 || tokens[..seed_at].iter().any(|t| t.is_empty()) {
            return Err(malformed("missing or empty prefix before 'seed'"));
        }

        // After the prefix the layout is fixed.
        let rest = &tokens[seed_at..];
        if rest.len() < 4 || rest[2] != "horizon" {
            return Err(malformed("expected '_seed_<int>_horizon_<int>'"));
        }

        let seed = parse_unsigned(rest[1]).ok_or_else(|| malformed("seed is not an unsigned integer"))?;
        let horizon_raw =
            parse_unsigned(rest[3]).ok_or_else(|| malformed("horizon is not an unsigned integer"))?;

        let profile = match &rest[4..] {
            [] => AttackProfile::Balanced,
            ["profile", name] => {
                AttackProfile::parse(name).ok_or_else(|| EnvIdError::UnknownProfile {
                    name: name.to_string(),
                })?
            }
            _ => return Err(malformed("unexpected trailing tokens")),
        };

        if horizon_raw == 0 || horizon_raw > u64::from(MAX_HORIZON) {
            return Err(EnvIdError::HorizonOutOfRange {
                horizon: horizon_raw,
            });
        }

        EnvConfig::new(seed, horizon_raw as u32, profile)
    }
}

impl fmt::Display for EnvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_env_id())
    }
}

fn positions(tokens: &[&str], needle: &str) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == needle)
        .map(|(i, _)| i)
        .collect()
}

/// Strict unsigned parse: ASCII digits only (no sign, no whitespace).
fn parse_unsigned(token: &str) -> Option<u64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_ids() {
        let cfg = EnvConfig::parse("cyber_defense_env_seed_42_horizon_24").unwrap();
        assert_eq!(cfg.seed(), 42);
        assert_eq!(cfg.horizon(), 24);
        assert_eq!(cfg.profile(), AttackProfile::Balanced);

        let cfg = EnvConfig::parse("env_seed_7_horizon_12_profile_sparse").unwrap();
        assert_eq!(cfg.seed(), 7);
        assert_eq!(cfg.horizon(), 12);
        assert_eq!(cfg.profile(), AttackProfile::Sparse);
    }

    #[test]
    fn canonical_format_round_trips() {
        let cfg = EnvConfig::new(300, 24, AttackProfile::HighPressure).unwrap();
        let id = cfg.to_env_id();
        assert_eq!(id, "cyber_defense_env_seed_300_horizon_24_profile_highpressure");
        assert_eq!(EnvConfig::parse(&id).unwrap(), cfg);

        let cfg = EnvConfig::new(42, 24, AttackProfile::Balanced).unwrap();
        assert_eq!(cfg.to_env_id_with_prefix("env"), "env_seed_42_horizon_24");
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in [
            "",
            "env",
            "seed_42_horizon_24",
            "env_seed_42",
            "env_horizon_24",
            "env_seed_x_horizon_24",
            "env_seed_42_horizon_",
            "env_seed_-4_horizon_24",
            "env_seed_42_horizon_24_extra",
            "env_seed_1_seed_2_horizon_24",
            "env_seed_42_horizon_24_profile",
            "env_horizon_24_seed_42",
            "env__seed_42_horizon_24",
        ] {
            assert!(EnvConfig::parse(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn rejects_horizon_out_of_range() {
        assert!(matches!(
            EnvConfig::parse("env_seed_1_horizon_0"),
            Err(EnvIdError::HorizonOutOfRange { horizon: 0 })
        ));
        assert!(matches!(
            EnvConfig::parse("env_seed_1_horizon_99999999999"),
            Err(EnvIdError::HorizonOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_unknown_profile() {
        assert!(matches!(
            EnvConfig::parse("env_seed_1_horizon_24_profile_chaos"),
            Err(EnvIdError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn step_cap_is_twice_horizon() {
        let cfg = EnvConfig::new(0, 24, AttackProfile::Balanced).unwrap();
        assert_eq!(cfg.step_cap(), 48);
    }
}
