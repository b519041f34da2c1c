// src/logging.rs
//
// Audit sinks for the trust pipeline.
// - AuditSink:  trait the pipeline reports every decision to
// - NoopSink:   discards all events
// - MemorySink: keeps events in memory (tests, embedding)
// - JsonlSink:  one JSON object per line, flushed per record
//
// Diagnostics go through `tracing`; the audit stream is the durable record
// of what was accepted or rejected and why.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

use crate::ledger::LedgerEntry;
use crate::verifier::VerificationResult;

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Submission taken from the collector for verification.
    Submission {
        submission_id: u64,
        agent_id: String,
        policy_hash: String,
    },
    /// Verifier decision.
    Verification(VerificationResult),
    /// Entry written to the ledger.
    LedgerAppend { index: usize, entry: LedgerEntry },
}

/// Abstract sink for audit events.
pub trait AuditSink: Send {
    fn record(&mut self, event: &AuditEvent);
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl AuditSink for NoopSink {
    fn record(&mut self, _event: &AuditEvent) {}
}

/// Thread-safe in-memory recorder. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemorySink {
    fn record(&mut self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// JSONL file sink (appends).
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_event(&mut self, event: &AuditEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl AuditSink for JsonlSink {
    fn record(&mut self, event: &AuditEvent) {
        // An audit write failure must not abort the pipeline; it is reported.
        if let Err(e) = self.write_event(event) {
            warn!(error = %e, "failed to write audit event");
        }
    }
}
