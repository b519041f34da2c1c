// src/rl/cyber_env.rs
//
// Decision-level cyber-defense simulation.
//
// The agent observes attack indicators plus its own system health and picks a
// defensive action; rewards trade damage prevented against operational cost.
// This is a labelled simulation used to exercise policy replay, not a model of
// any real network.
//
// Determinism:
// - The attack schedule (severity, type, alert confidence per step) is drawn
//   once from ChaCha8(seed), stream 0.
// - Health dynamics for episode `k` draw from ChaCha8(seed), stream k + 1.
//   Episodes are therefore independent of each other and of call order, and
//   the same (seed, horizon, profile, episode, actions) always yields the same
//   trajectory.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Action, State};

use super::env_id::EnvConfig;

// ===== coordinate levels =====

pub const SEVERITY_LOW: u8 = 0;
pub const SEVERITY_MEDIUM: u8 = 1;
pub const SEVERITY_HIGH: u8 = 2;

pub const TYPE_SCAN: u8 = 0;
pub const TYPE_BRUTE_FORCE: u8 = 1;
pub const TYPE_DOS: u8 = 2;

pub const HEALTH_HEALTHY: u8 = 0;
pub const HEALTH_DEGRADED: u8 = 1;
pub const HEALTH_CRITICAL: u8 = 2;

pub const CONFIDENCE_LOW: u8 = 0;
pub const CONFIDENCE_HIGH: u8 = 1;

pub const TIME_SHORT: u8 = 0;
pub const TIME_LONG: u8 = 1;

/// Probability that a HIGH-severity step is followed by another HIGH step.
const HIGH_PERSISTENCE: f64 = 0.6;
/// Attack type weights SCAN / BRUTE_FORCE / DOS.
const ATTACK_TYPE_WEIGHTS: [f64; 3] = [0.4, 0.4, 0.2];
/// Consecutive MEDIUM+ steps before the attack counts as LONG.
const LONG_ATTACK_STEPS: u32 = 3;

const CRITICAL_PENALTY: f64 = 10.0;
const SURVIVAL_BONUS_HEALTHY: f64 = 5.0;
const SURVIVAL_BONUS_DEGRADED: f64 = 2.0;

/// Result of a single environment step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Observation after the action.
    pub observation: State,
    /// Reward for this step (including any terminal bonus or penalty).
    pub reward: f64,
    /// Whether the episode has terminated.
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("episode {episode} has terminated; call reset()")]
    EpisodeFinished { episode: u64 },
}

/// Per-step attack indicators, fixed for the lifetime of the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttackStep {
    severity: u8,
    attack_type: u8,
    confidence: u8,
}

/// Cyber-defense environment (reset / step).
#[derive(Debug, Clone)]
pub struct CyberDefenseEnv {
    config: EnvConfig,
    schedule: Vec<AttackStep>,

    // Episode state.
    rng: ChaCha8Rng,
    episode: u64,
    step_index: u32,
    system_health: u8,
    time_under_attack: u8,
    consecutive_attacks: u32,
    damage_accumulated: f64,
    done: bool,
}

impl CyberDefenseEnv {
    /// Build the environment and its attack schedule, ready at episode 0.
    pub fn new(config: EnvConfig) -> Self {
        let schedule = generate_schedule(&config);
        let mut env = Self {
            config,
            schedule,
            rng: episode_rng(config.seed(), 0),
            episode: 0,
            step_index: 0,
            system_health: HEALTH_HEALTHY,
            time_under_attack: TIME_SHORT,
            consecutive_attacks: 0,
            damage_accumulated: 0.0,
            done: false,
        };
        env.reset(0);
        env
    }

    /// Start episode `episode` and return the initial observation.
    pub fn reset(&mut self, episode: u64) -> State {
        self.rng = episode_rng(self.config.seed(), episode);
        self.episode = episode;
        self.step_index = 0;
        self.system_health = HEALTH_HEALTHY;
        self.time_under_attack = TIME_SHORT;
        self.consecutive_attacks = 0;
        self.damage_accumulated = 0.0;
        self.done = false;
        self.observe()
    }

    /// Apply one defensive action and advance by one time step.
    pub fn step(&mut self, action: Action) -> Result<StepResult, EnvError> {
        if self.done {
            return Err(EnvError::EpisodeFinished {
                episode: self.episode,
            });
        }

        let attack = self.schedule[self.step_index as usize];

        let mut reward = self.action_reward(action, attack);
        self.update_health(action, attack.severity);

        if attack.severity >= SEVERITY_MEDIUM {
            self.consecutive_attacks += 1;
            if self.consecutive_attacks >= LONG_ATTACK_STEPS {
                self.time_under_attack = TIME_LONG;
            }
        } else {
            self.consecutive_attacks = 0;
            self.time_under_attack = TIME_SHORT;
        }

        self.step_index += 1;

        if self.system_health == HEALTH_CRITICAL {
            reward -= CRITICAL_PENALTY;
            self.done = true;
        } else if self.step_index >= self.config.horizon() {
            reward += match self.system_health {
                HEALTH_HEALTHY => SURVIVAL_BONUS_HEALTHY,
                HEALTH_DEGRADED => SURVIVAL_BONUS_DEGRADED,
                _ => 0.0,
            };
            self.done = true;
        }

        Ok(StepResult {
            observation: self.observe(),
            reward,
            done: self.done,
        })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn episode(&self) -> u64 {
        self.episode
    }

    pub fn step_index(&self) -> u32 {
        self.step_index
    }

    pub fn system_health(&self) -> u8 {
        self.system_health
    }

    /// Damage accrued this episode by under-reacting (diagnostic only).
    pub fn damage_accumulated(&self) -> f64 {
        self.damage_accumulated
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn observe(&self) -> State {
        // Past the horizon the attack indicators read as zero.
        let attack = self
            .schedule
            .get(self.step_index as usize)
            .copied()
            .unwrap_or(AttackStep {
                severity: SEVERITY_LOW,
                attack_type: TYPE_SCAN,
                confidence: CONFIDENCE_LOW,
            });
        State {
            attack_severity: attack.severity,
            attack_type: attack.attack_type,
            system_health: self.system_health,
            alert_confidence: attack.confidence,
            time_under_attack: self.time_under_attack,
        }
    }

    fn action_reward(&mut self, action: Action, attack: AttackStep) -> f64 {
        let AttackStep {
            severity,
            attack_type,
            confidence,
        } = attack;

        match action {
            Action::Ignore => match severity {
                SEVERITY_HIGH => {
                    self.damage_accumulated += 3.0;
                    -10.0
                }
                SEVERITY_MEDIUM => {
                    self.damage_accumulated += 1.0;
                    -4.0
                }
                _ if confidence == CONFIDENCE_LOW => 2.0,
                _ => -1.0,
            },
            Action::Monitor => {
                let outcome = match severity {
                    SEVERITY_LOW => 3.0,
                    SEVERITY_HIGH => {
                        self.damage_accumulated += 1.0;
                        -3.0
                    }
                    _ => 1.0,
                };
                -0.2 + outcome
            }
            Action::RateLimit => {
                let outcome = if attack_type == TYPE_DOS || attack_type == TYPE_BRUTE_FORCE {
                    if severity >= SEVERITY_MEDIUM {
                        8.0
                    } else {
                        3.0
                    }
                } else {
                    -0.5
                };
                -1.0 + outcome
            }
            Action::BlockIp => {
                let outcome = if severity == SEVERITY_HIGH && confidence == CONFIDENCE_HIGH {
                    10.0
                } else if severity >= SEVERITY_MEDIUM {
                    5.0
                } else {
                    -2.0
                };
                -1.5 + outcome
            }
            Action::IsolateService => {
                let outcome = if severity == SEVERITY_HIGH {
                    if attack_type == TYPE_DOS {
                        12.0
                    } else {
                        8.0
                    }
                } else {
                    -4.0
                };
                -3.0 + outcome
            }
        }
    }

    fn update_health(&mut self, action: Action, severity: u8) {
        match severity {
            SEVERITY_HIGH => {
                let strong = matches!(action, Action::BlockIp | Action::IsolateService);
                if strong && self.rng.gen::<f64>() < 0.7 {
                    return;
                }
                if self.system_health == HEALTH_HEALTHY {
                    self.system_health = HEALTH_DEGRADED;
                } else if self.system_health == HEALTH_DEGRADED && self.rng.gen::<f64>() < 0.4 {
                    self.system_health = HEALTH_CRITICAL;
                }
            }
            SEVERITY_MEDIUM => {
                if action != Action::Ignore {
                    if self.system_health == HEALTH_DEGRADED && self.rng.gen::<f64>() < 0.3 {
                        self.system_health = HEALTH_HEALTHY;
                    }
                } else if self.system_health == HEALTH_HEALTHY && self.rng.gen::<f64>() < 0.2 {
                    self.system_health = HEALTH_DEGRADED;
                }
            }
            _ => {
                if self.system_health == HEALTH_DEGRADED && self.rng.gen::<f64>() < 0.4 {
                    self.system_health = HEALTH_HEALTHY;
                }
            }
        }
    }
}

fn episode_rng(seed: u64, episode: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(episode.wrapping_add(1));
    rng
}

fn generate_schedule(config: &EnvConfig) -> Vec<AttackStep> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed());
    let horizon = config.horizon() as usize;
    let severity_weights = config.profile().severity_weights();

    let mut severity: Vec<u8> = (0..horizon)
        .map(|_| sample_weighted(&mut rng, &severity_weights))
        .collect();
    for i in 1..horizon {
        if severity[i - 1] == SEVERITY_HIGH && rng.gen::<f64>() < HIGH_PERSISTENCE {
            severity[i] = SEVERITY_HIGH;
        }
    }

    let attack_type: Vec<u8> = (0..horizon)
        .map(|_| sample_weighted(&mut rng, &ATTACK_TYPE_WEIGHTS))
        .collect();

    severity
        .iter()
        .zip(attack_type)
        .map(|(&severity, attack_type)| {
            let p_high = match severity {
                SEVERITY_HIGH => 0.8,
                SEVERITY_MEDIUM => 0.5,
                _ => 0.3,
            };
            let confidence = if rng.gen::<f64>() < p_high {
                CONFIDENCE_HIGH
            } else {
                CONFIDENCE_LOW
            };
            AttackStep {
                severity,
                attack_type,
                confidence,
            }
        })
        .collect()
}

/// Inverse-CDF draw over three levels.
fn sample_weighted(rng: &mut ChaCha8Rng, weights: &[f64; 3]) -> u8 {
    let u: f64 = rng.gen();
    let mut acc = 0.0;
    for (level, w) in weights.iter().enumerate() {
        acc += w;
        if u < acc {
            return level as u8;
        }
    }
    (weights.len() - 1) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::env_id::AttackProfile;

    fn cfg(seed: u64, horizon: u32) -> EnvConfig {
        EnvConfig::new(seed, horizon, AttackProfile::Balanced).unwrap()
    }

    fn rollout(env: &mut CyberDefenseEnv, episode: u64, action: Action) -> (Vec<State>, f64) {
        let mut states = vec![env.reset(episode)];
        let mut total = 0.0;
        loop {
            let r = env.step(action).unwrap();
            states.push(r.observation);
            total += r.reward;
            if r.done {
                break;
            }
        }
        (states, total)
    }

    #[test]
    fn same_seed_same_trajectory() {
        let mut a = CyberDefenseEnv::new(cfg(42, 24));
        let mut b = CyberDefenseEnv::new(cfg(42, 24));
        for episode in 0..5 {
            assert_eq!(
                rollout(&mut a, episode, Action::BlockIp),
                rollout(&mut b, episode, Action::BlockIp)
            );
        }
    }

    #[test]
    fn episodes_do_not_depend_on_call_order() {
        let mut a = CyberDefenseEnv::new(cfg(7, 24));
        let first = rollout(&mut a, 3, Action::Monitor);
        let _ = rollout(&mut a, 0, Action::Ignore);
        let again = rollout(&mut a, 3, Action::Monitor);
        assert_eq!(first, again);
    }

    #[test]
    fn different_seeds_give_different_schedules() {
        let a = generate_schedule(&cfg(1, 48));
        let b = generate_schedule(&cfg(2, 48));
        assert_ne!(a, b);
    }

    #[test]
    fn episode_ends_within_horizon() {
        let mut env = CyberDefenseEnv::new(cfg(42, 12));
        let (states, _) = rollout(&mut env, 0, Action::RateLimit);
        assert!(states.len() <= 13);
        assert!(env.is_done());
        assert!(env.step_index() <= 12);
    }

    #[test]
    fn step_after_done_is_an_error() {
        let mut env = CyberDefenseEnv::new(cfg(42, 1));
        let r = env.step(Action::Monitor).unwrap();
        assert!(r.done);
        assert_eq!(
            env.step(Action::Monitor),
            Err(EnvError::EpisodeFinished { episode: 0 })
        );
        env.reset(1);
        assert!(env.step(Action::Monitor).is_ok());
    }

    #[test]
    fn terminal_observation_zeroes_attack_indicators() {
        let mut env = CyberDefenseEnv::new(cfg(5, 3));
        env.reset(0);
        let mut last = None;
        for _ in 0..3 {
            let r = env.step(Action::IsolateService).unwrap();
            last = Some(r);
            if r.done {
                break;
            }
        }
        let last = last.unwrap();
        if env.step_index() == 3 && env.system_health() != HEALTH_CRITICAL {
            assert_eq!(last.observation.attack_severity, 0);
            assert_eq!(last.observation.attack_type, 0);
            assert_eq!(last.observation.alert_confidence, 0);
        }
    }

    #[test]
    fn reward_table_matches_action_semantics() {
        let mut env = CyberDefenseEnv::new(cfg(0, 24));
        let high_dos = AttackStep {
            severity: SEVERITY_HIGH,
            attack_type: TYPE_DOS,
            confidence: CONFIDENCE_HIGH,
        };
        let low_scan_quiet = AttackStep {
            severity: SEVERITY_LOW,
            attack_type: TYPE_SCAN,
            confidence: CONFIDENCE_LOW,
        };
        assert_eq!(env.action_reward(Action::Ignore, high_dos), -10.0);
        assert_eq!(env.action_reward(Action::IsolateService, high_dos), 9.0);
        assert_eq!(env.action_reward(Action::BlockIp, high_dos), 8.5);
        assert_eq!(env.action_reward(Action::Ignore, low_scan_quiet), 2.0);
        assert_eq!(env.action_reward(Action::RateLimit, low_scan_quiet), -1.5);
        assert!((env.action_reward(Action::Monitor, low_scan_quiet) - 2.8).abs() < 1e-12);
    }

    #[test]
    fn profiles_shift_severity_mix() {
        let count_high = |profile| {
            let c = EnvConfig::new(11, 2000, profile).unwrap();
            generate_schedule(&c)
                .iter()
                .filter(|s| s.severity == SEVERITY_HIGH)
                .count()
        };
        assert!(count_high(AttackProfile::HighPressure) > count_high(AttackProfile::Balanced));
        assert!(count_high(AttackProfile::Balanced) > count_high(AttackProfile::Sparse));
    }
}
