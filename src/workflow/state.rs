// AuditState - the single state object threaded through the audit graph
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rulebase::RuleChunk;
use crate::verdict::AuditVerdict;

use super::error::StageError;

/// Position in the audit state machine. Both Done variants are
/// terminal; the graph never re-enters an earlier phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditPhase {
    Start,
    Extracting,
    Judging,
    DoneSuccess,
    DoneError,
}

impl AuditPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuditPhase::DoneSuccess | AuditPhase::DoneError)
    }
}

/// Written by the first stage that cannot complete its contract.
/// `recoverable` tells the caller whether retrying the same audit
/// with the same input may succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub stage: String,
    pub message: String,
    pub recoverable: bool,
}

/// AuditState - accumulates inputs, intermediate artifacts, outputs,
/// and errors across the pipeline. Created fresh per audit request,
/// runs through the graph exactly once, then is read by the front end.
///
/// Each stage writes only the fields it owns and never overwrites a
/// field set by an earlier stage; the only append point is the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditState {
    /// Correlation id for logs
    pub audit_id: Uuid,

    /// Input identifier; immutable after creation
    pub video_url: String,

    /// Speech-to-text output, set once by extraction. An empty string
    /// is a valid outcome (video with no speech); None means the
    /// stage has not run or failed.
    pub raw_transcript: Option<String>,

    /// OCR output, set once by extraction; same empty-vs-unset rules
    pub on_screen_text: Option<String>,

    /// Rule fragments in the order the retrieval service ranked them.
    /// Never re-sorted locally.
    pub retrieved_rules: Vec<RuleChunk>,

    /// Final structured judgment, set once by the judgment stage
    pub verdict: Option<AuditVerdict>,

    /// First failure wins; once set, no later stage runs
    pub error: Option<ErrorRecord>,

    /// Append-only log of stage names entered, for diagnostics
    pub stage_trace: Vec<String>,

    pub phase: AuditPhase,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuditState {
    pub fn new(video_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            audit_id: Uuid::new_v4(),
            video_url: video_url.into(),
            raw_transcript: None,
            on_screen_text: None,
            retrieved_rules: Vec::new(),
            verdict: None,
            error: None,
            stage_trace: Vec::new(),
            phase: AuditPhase::Start,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record entry into a stage: the trace strictly grows and the
    /// phase advances. Called by the graph, never by nodes.
    pub fn enter_stage(&mut self, name: &str, phase: AuditPhase) {
        self.stage_trace.push(name.to_string());
        self.phase = phase;
        self.updated_at = Utc::now();
    }

    /// Record a stage failure. The first error wins; a later failure
    /// can never displace it (the graph stops running nodes anyway).
    pub fn record_error(&mut self, err: StageError) {
        if self.error.is_none() {
            self.error = Some(err.into_record());
        }
        self.updated_at = Utc::now();
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn mark_terminal(&mut self) {
        self.phase = if self.error.is_some() {
            AuditPhase::DoneError
        } else {
            AuditPhase::DoneSuccess
        };
        self.updated_at = Utc::now();
    }
}
