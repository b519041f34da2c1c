// src/pipeline.rs
//
// Submission -> verification -> ledger.
//
// The pipeline is the only place that calls Ledger::append, and only for a
// VALID result, recording the verified reward (never the claimed one).
// Every decision goes to the audit sink.

use tracing::{debug, error};

use crate::claim::PolicyClaim;
use crate::ledger::{Ledger, LedgerEntry, LedgerError};
use crate::logging::{AuditEvent, AuditSink, NoopSink};
use crate::submission::SubmissionCollector;
use crate::verifier::{VerificationResult, Verifier};

/// What happened to one claim.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// Set when the claim came through a collector.
    pub submission_id: Option<u64>,
    pub result: VerificationResult,
    /// The appended entry; None when the claim was rejected.
    pub entry: Option<LedgerEntry>,
}

impl PipelineOutcome {
    pub fn accepted(&self) -> bool {
        self.entry.is_some()
    }
}

pub struct TrustPipeline {
    verifier: Verifier,
    ledger: Ledger,
    sink: Box<dyn AuditSink>,
}

impl std::fmt::Debug for TrustPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustPipeline")
            .field("verifier", &self.verifier)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl TrustPipeline {
    pub fn new(verifier: Verifier, ledger: Ledger) -> Self {
        Self {
            verifier,
            ledger,
            sink: Box::new(NoopSink),
        }
    }

    pub fn with_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    /// Verify one claim and record it if VALID.
    ///
    /// A rejection is an Ok outcome. Err only means the ledger could not be
    /// written; the entry was rolled back in that case.
    pub fn process(&mut self, claim: &PolicyClaim) -> Result<PipelineOutcome, LedgerError> {
        self.process_inner(None, claim)
    }

    /// Drain the collector and process every claim in submission order.
    ///
    /// On a ledger write failure the failing claim and everything after it
    /// go back into the collector, and the error is returned.
    pub fn process_all(
        &mut self,
        collector: &mut SubmissionCollector,
    ) -> Result<Vec<PipelineOutcome>, LedgerError> {
        let mut pending = collector.drain().into_iter();
        let mut outcomes = Vec::with_capacity(pending.len());

        while let Some(submission) = pending.next() {
            self.sink.record(&AuditEvent::Submission {
                submission_id: submission.submission_id,
                agent_id: submission.claim.agent_id.clone(),
                policy_hash: submission.claim.policy_hash.clone(),
            });
            match self.process_inner(Some(submission.submission_id), &submission.claim) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    let mut rest = vec![submission];
                    rest.extend(pending);
                    error!(requeued = rest.len(), error = %e, "stopping batch on ledger failure");
                    collector.requeue(rest);
                    return Err(e);
                }
            }
        }

        debug!(
            processed = outcomes.len(),
            accepted = outcomes.iter().filter(|o| o.accepted()).count(),
            "batch processed"
        );
        Ok(outcomes)
    }

    fn process_inner(
        &mut self,
        submission_id: Option<u64>,
        claim: &PolicyClaim,
    ) -> Result<PipelineOutcome, LedgerError> {
        let result = self.verifier.verify(claim);
        self.sink.record(&AuditEvent::Verification(result.clone()));

        let entry = match (result.is_valid(), result.verified_reward) {
            (true, Some(reward)) => {
                let entry = self.ledger.append(&result.policy_hash, reward, &result.agent_id)?;
                self.sink.record(&AuditEvent::LedgerAppend {
                    index: self.ledger.len().saturating_sub(1),
                    entry: entry.clone(),
                });
                Some(entry)
            }
            _ => None,
        };

        Ok(PipelineOutcome {
            submission_id,
            result,
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::ledger::GENESIS_HASH;
    use crate::logging::MemorySink;
    use crate::rl::env_id::{AttackProfile, EnvConfig};
    use crate::rl::policy::PolicyArtifact;
    use crate::rl::replay::ReplayEngine;
    use crate::types::{Action, State};

    fn claim(agent: &str, action: Action) -> PolicyClaim {
        let mut t = BTreeMap::new();
        for s in State::all() {
            t.insert(s, action);
        }
        let artifact = PolicyArtifact::new(t).unwrap();
        let env_id = EnvConfig::new(5, 12, AttackProfile::Balanced).unwrap().to_env_id();
        let reward = ReplayEngine::new(4).replay(&env_id, &artifact).unwrap().average_reward;
        PolicyClaim {
            agent_id: agent.to_string(),
            env_id,
            policy_hash: artifact.hash().to_string(),
            policy_artifact: artifact.to_bytes(),
            claimed_reward: reward,
        }
    }

    fn pipeline(sink: MemorySink) -> TrustPipeline {
        TrustPipeline::new(Verifier::default().with_replay_episodes(4), Ledger::in_memory()).with_sink(sink)
    }

    #[test]
    fn only_valid_claims_reach_the_ledger() {
        let sink = MemorySink::new();
        let mut p = pipeline(sink.clone());

        let honest = claim("honest", Action::Monitor);
        let inflated = claim("liar", Action::BlockIp);
        let inflated = inflated.with_claimed_reward(inflated.claimed_reward + 10.0);

        let ok = p.process(&honest).unwrap();
        assert!(ok.accepted());
        let entry = ok.entry.unwrap();
        assert_eq!(entry.previous_hash, GENESIS_HASH);
        assert_eq!(Some(entry.verified_reward), ok.result.verified_reward);

        let rejected = p.process(&inflated).unwrap();
        assert!(!rejected.accepted());
        assert_eq!(p.ledger().len(), 1);

        // verification, append, verification
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn process_all_preserves_submission_order() {
        let sink = MemorySink::new();
        let mut p = pipeline(sink.clone());
        let mut collector = SubmissionCollector::new();
        collector.submit(claim("a", Action::Monitor));
        collector.submit(claim("b", Action::Ignore).with_claimed_reward(1e9));
        collector.submit(claim("c", Action::RateLimit));

        let outcomes = p.process_all(&mut collector).unwrap();
        assert!(collector.is_empty());
        let ids: Vec<_> = outcomes.iter().map(|o| o.submission_id).collect();
        assert_eq!(ids, [Some(1), Some(2), Some(3)]);

        let agents: Vec<_> = p.ledger().read_all().into_iter().map(|e| e.agent_id).collect();
        assert_eq!(agents, ["a", "c"]);
        assert!(p.ledger().verify_integrity().is_ok());

        let submissions = sink
            .events()
            .iter()
            .filter(|e| matches!(e, AuditEvent::Submission { .. }))
            .count();
        assert_eq!(submissions, 3);
    }
}
