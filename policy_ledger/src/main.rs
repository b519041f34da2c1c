// src/main.rs
//
// CLI entrypoint for the policy ledger.
//
// Precedence for pipeline settings: CLI flag > POLICY_LEDGER_* env > default.
// Claims move between invocations as JSON claim files (`train` writes one,
// `verify` / `process` / `determinism` read them).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use policy_ledger::config::PipelineConfig;
use policy_ledger::consumer::{BaselineKind, Consumer, DEFAULT_EXECUTION_HORIZON};
use policy_ledger::ledger::{load_entries, verify_chain};
use policy_ledger::logging::{JsonlSink, NoopSink};
use policy_ledger::marketplace::{best_policy, ranked_policies};
use policy_ledger::rl::env_id::EnvConfig;
use policy_ledger::rl::presets::{preset, PRESETS};
use policy_ledger::rl::runner::run_agent;
use policy_ledger::rl::trainer::{TrainerConfig, DEFAULT_TRAINING_EPISODES};
use policy_ledger::{read_claim_file, write_claim_file, SubmissionCollector, TrustPipeline, Verifier};

/// Execution seed for reuse when neither a flag nor recorded metadata gives one.
const DEFAULT_REUSE_SEED: u64 = 42;

#[derive(Debug, Parser)]
#[command(
    name = "policy-ledger",
    about = "Replay-verified ledger of RL policy claims",
    version
)]
struct Cli {
    /// Ledger file (overrides POLICY_LEDGER_LEDGER_PATH).
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// Policy artifact directory (overrides POLICY_LEDGER_POLICY_DIR).
    #[arg(long, global = true)]
    policy_dir: Option<PathBuf>,

    /// JSONL audit log (overrides POLICY_LEDGER_AUDIT_LOG).
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    /// Accepted |claimed - verified| difference.
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Episodes averaged by verification replay.
    #[arg(long, global = true)]
    replay_episodes: Option<u32>,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train an agent, save its policy artifact and write a claim file.
    Train {
        #[arg(long)]
        agent: String,

        /// Environment preset (see `presets`).
        #[arg(long, default_value = "standard", conflicts_with = "env_id")]
        preset: String,

        /// Explicit environment id instead of a preset.
        #[arg(long)]
        env_id: Option<String>,

        #[arg(long, default_value_t = DEFAULT_TRAINING_EPISODES)]
        episodes: u32,

        /// Exploration seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Claim file to write (default: <agent>_claim.json).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Verify the claim right away and append it if valid.
        #[arg(long)]
        submit: bool,
    },

    /// Verify one claim file.
    Verify {
        #[arg(long)]
        claim: PathBuf,

        /// Append to the ledger if the claim is valid.
        #[arg(long)]
        append: bool,
    },

    /// Submit claim files in order and run them through the pipeline.
    Process {
        #[arg(required = true)]
        claims: Vec<PathBuf>,
    },

    /// Replay a claim repeatedly and require identical rewards.
    Determinism {
        #[arg(long)]
        claim: PathBuf,

        #[arg(long, default_value_t = 5)]
        runs: u32,
    },

    /// Inspect the ledger.
    Ledger {
        #[command(subcommand)]
        action: LedgerCommand,
    },

    /// Query the marketplace.
    Market {
        #[command(subcommand)]
        action: MarketCommand,
    },

    /// Reuse the best verified policy and compare it with a baseline.
    Reuse {
        #[arg(long, default_value = "random")]
        baseline: BaselineKind,

        #[arg(long, default_value_t = 10)]
        episodes: u32,

        /// Execution seed (default: the recorded environment's seed, else 42).
        #[arg(long)]
        seed: Option<u64>,

        /// Episode horizon (default: the recorded environment's horizon).
        #[arg(long)]
        horizon: Option<u32>,
    },

    /// List environment presets.
    Presets,
}

#[derive(Debug, Subcommand)]
enum LedgerCommand {
    /// Re-verify the persisted hash chain.
    Verify,
    /// Print every entry.
    List,
}

#[derive(Debug, Subcommand)]
enum MarketCommand {
    /// Highest verified reward.
    Best,
    /// All entries, best first.
    Rank,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn resolve_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut cfg = PipelineConfig::from_env();
    if let Some(p) = &cli.ledger {
        cfg.ledger_path = p.clone();
    }
    if let Some(p) = &cli.policy_dir {
        cfg.policy_dir = p.clone();
    }
    if let Some(p) = &cli.audit_log {
        cfg.audit_log = Some(p.clone());
    }
    if let Some(t) = cli.threshold {
        if !(t.is_finite() && t >= 0.0) {
            bail!("--threshold must be a finite, non-negative number (got {t})");
        }
        cfg.reward_threshold = t;
    }
    if let Some(n) = cli.replay_episodes {
        if n == 0 {
            bail!("--replay-episodes must be at least 1");
        }
        cfg.replay_episodes = n;
    }
    Ok(cfg)
}

fn build_pipeline(cfg: &PipelineConfig, verifier: Verifier) -> Result<TrustPipeline> {
    let ledger = cfg
        .open_ledger()
        .with_context(|| format!("failed to open ledger {}", cfg.ledger_path.display()))?;
    let pipeline = TrustPipeline::new(verifier, ledger);
    Ok(match &cfg.audit_log {
        Some(path) => pipeline.with_sink(
            JsonlSink::open(path).with_context(|| format!("failed to open audit log {}", path.display()))?,
        ),
        None => pipeline.with_sink(NoopSink),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_claim(path: &Path) -> Result<policy_ledger::PolicyClaim> {
    read_claim_file(path).with_context(|| format!("cannot use claim file {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cfg = resolve_config(&cli)?;

    match &cli.command {
        Command::Train {
            agent,
            preset: preset_name,
            env_id,
            episodes,
            seed,
            out,
            submit,
        } => {
            let env = match env_id {
                Some(id) => EnvConfig::parse(id)?,
                None => preset(preset_name)?.env_config()?,
            };
            let trainer = TrainerConfig::default().with_episodes(*episodes).with_seed(*seed);
            let verifier = cfg.verifier();
            let claim = run_agent(agent, &env, trainer, verifier.replay_engine(), &cfg.artifact_store(), None)
                .with_context(|| format!("training agent {agent} failed"))?;

            let out = out
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{agent}_claim.json")));
            write_claim_file(&out, &claim)?;
            info!(claim_file = %out.display(), claimed_reward = claim.claimed_reward, "claim written");

            if *submit {
                let mut pipeline = build_pipeline(&cfg, verifier)?;
                let outcome = pipeline.process(&claim)?;
                print_json(&outcome.result)?;
            }
        }

        Command::Verify { claim, append } => {
            let claim = read_claim(claim)?;
            let result = if *append {
                build_pipeline(&cfg, cfg.verifier())?.process(&claim)?.result
            } else {
                cfg.verifier().verify(&claim)
            };
            print_json(&result)?;
        }

        Command::Process { claims } => {
            let mut collector = SubmissionCollector::new();
            for path in claims {
                collector.submit(read_claim(path)?);
            }
            let mut pipeline = build_pipeline(&cfg, cfg.verifier())?;
            let outcomes = pipeline.process_all(&mut collector)?;
            let results: Vec<_> = outcomes.iter().map(|o| &o.result).collect();
            print_json(&results)?;
            info!(
                submitted = outcomes.len(),
                accepted = outcomes.iter().filter(|o| o.accepted()).count(),
                ledger_entries = pipeline.ledger().len(),
                "batch complete"
            );
        }

        Command::Determinism { claim, runs } => {
            let claim = read_claim(claim)?;
            let report = cfg.verifier().verify_determinism(&claim, *runs)?;
            print_json(&report)?;
        }

        Command::Ledger { action } => {
            // Loading already re-verifies the chain; a corrupted file fails here.
            let entries = load_existing(&cfg.ledger_path)?;
            match action {
                LedgerCommand::Verify => {
                    verify_chain(&entries)?;
                    println!("ledger OK: {} entries", entries.len());
                }
                LedgerCommand::List => print_json(&entries)?,
            }
        }

        Command::Market { action } => {
            let entries = load_existing(&cfg.ledger_path)?;
            match action {
                MarketCommand::Best => match best_policy(&entries) {
                    Some(best) => print_json(&best)?,
                    None => println!("ledger is empty"),
                },
                MarketCommand::Rank => print_json(&ranked_policies(&entries))?,
            }
        }

        Command::Reuse {
            baseline,
            episodes,
            seed,
            horizon,
        } => {
            let entries = load_existing(&cfg.ledger_path)?;
            let Some(best) = best_policy(&entries) else {
                bail!("ledger {} has no verified policies", cfg.ledger_path.display());
            };
            let mut consumer = Consumer::new(cfg.artifact_store());
            let recorded = consumer.verified_env(&best.policy_hash)?;
            if let Some(env) = &recorded {
                consumer = consumer.with_env(env);
            }
            if let Some(h) = horizon {
                consumer = consumer.with_horizon(*h);
            } else if recorded.is_none() {
                consumer = consumer.with_horizon(DEFAULT_EXECUTION_HORIZON);
            }
            let seed = seed
                .or(recorded.map(|env| env.seed()))
                .unwrap_or(DEFAULT_REUSE_SEED);
            info!(env = ?recorded.map(|env| env.to_env_id()), seed, "reusing best policy");
            let report = consumer.reuse_best(&best, *baseline, *episodes, seed)?;
            print_json(&report)?;
        }

        Command::Presets => print_json(&PRESETS)?,
    }

    Ok(())
}

fn load_existing(path: &Path) -> Result<Vec<policy_ledger::LedgerEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    load_entries(path).with_context(|| format!("failed to load ledger {}", path.display()))
}
