// src/submission.rs
//
// Blind intake of policy claims.
//
// The collector stores claims in arrival order with sequential ids and a
// receive timestamp. It does not look inside them: no verification, no
// ranking, no deduplication. Claims leave only through `drain`, which hands
// them to verification in submission order.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::claim::PolicyClaim;
use crate::ledger::clock::{format_timestamp, Clock, SystemClock};

/// A received claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: u64,
    pub received_at: String,
    pub claim: PolicyClaim,
}

pub struct SubmissionCollector {
    pending: VecDeque<Submission>,
    next_id: u64,
    clock: Arc<dyn Clock>,
}

impl Default for SubmissionCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubmissionCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionCollector")
            .field("pending", &self.pending.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl SubmissionCollector {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            pending: VecDeque::new(),
            next_id: 1,
            clock,
        }
    }

    /// Accept a claim; returns a copy of the stored submission.
    pub fn submit(&mut self, claim: PolicyClaim) -> Submission {
        let submission = Submission {
            submission_id: self.next_id,
            received_at: format_timestamp(&self.clock.now()),
            claim,
        };
        self.next_id += 1;
        self.pending.push_back(submission.clone());
        submission
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending submissions from one agent, in order.
    pub fn by_agent(&self, agent_id: &str) -> Vec<&Submission> {
        self.pending
            .iter()
            .filter(|s| s.claim.agent_id == agent_id)
            .collect()
    }

    /// Remove and return every pending submission, oldest first.
    pub fn drain(&mut self) -> Vec<Submission> {
        self.pending.drain(..).collect()
    }

    /// Put unprocessed submissions back at the front, keeping their order.
    pub(crate) fn requeue(&mut self, unprocessed: Vec<Submission>) {
        for submission in unprocessed.into_iter().rev() {
            self.pending.push_front(submission);
        }
    }
}
