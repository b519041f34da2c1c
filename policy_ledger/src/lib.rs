//! Policy ledger core library.
//!
//! Agents train policies on a deterministic cyber-defense environment and
//! submit claims about the reward those policies earn. Nothing in a claim is
//! trusted: the verifier replays the policy and only a reproducible reward
//! reaches the ledger. The binary (`src/main.rs`) is a thin CLI around these
//! components.
//!
//! # Trust pipeline
//!
//! - **Submission** (`submission`): blind, ordered intake of `PolicyClaim`s.
//! - **Verifier** (`verifier`): hash check, artifact decode, greedy replay,
//!   reward comparison. Produces a `VerificationResult`, never an error.
//! - **Ledger** (`ledger`): append-only, SHA-256 hash-chained record of
//!   verified policies, persisted atomically and re-verified on load.
//! - **Marketplace** (`marketplace`): read-only ranking by verified reward.
//! - **Consumer** (`consumer`): loads a stored policy by hash and executes it
//!   against naive baselines, with no training.
//!
//! # Environment and training
//!
//! The `rl` module holds the simulator, the canonical policy artifact, the
//! shared replay loop and the Q-learning trainer agents use.
//!
//! # Ambient
//!
//! Diagnostics use `tracing`; the audit trail of decisions goes to an
//! `AuditSink` (`logging`). `config` loads `PipelineConfig` from defaults and
//! `POLICY_LEDGER_*` environment variables.

pub mod artifact_store;
pub mod claim;
pub mod config;
pub mod consumer;
pub mod ledger;
pub mod logging;
pub mod marketplace;
pub mod persist;
pub mod pipeline;
pub mod rl;
pub mod session;
pub mod submission;
pub mod types;
pub mod verifier;

pub use artifact_store::{ArtifactMetadata, ArtifactStore, StoreError};
pub use claim::{read_claim_file, write_claim_file, ClaimFileError, PolicyClaim};
pub use config::PipelineConfig;
pub use consumer::{
    improvement_percentage, BaselineKind, Comparison, Consumer, ConsumerError, ExecutionStats, ReuseReport,
};
pub use ledger::{ChainViolation, Corruption, Ledger, LedgerEntry, LedgerError, GENESIS_HASH};
pub use logging::{AuditEvent, AuditSink, JsonlSink, MemorySink, NoopSink};
pub use marketplace::{best_policy, ranked_policies, BestPolicyReference, Marketplace};
pub use pipeline::{PipelineOutcome, TrustPipeline};
pub use session::{InMemorySessionStore, SessionStatus, SessionStore, TrainingSession};
pub use submission::{Submission, SubmissionCollector};
pub use types::{Action, State};
pub use verifier::{
    DeterminismFault, DeterminismReport, Rejection, VerificationResult, VerificationStatus, Verifier,
};
