//! Core data model shared across the remedy pipeline
//!
//! These types describe a ticket moving through the fix-attempt loop:
//! the ticket itself, the patches proposed for it, and the per-attempt
//! records appended to its history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage for a ticket being remediated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStage {
    /// Obtaining and validating a task plan
    Planning,
    /// Generating and applying a patch
    Development,
    /// Running external tests against the applied patch
    Testing,
    /// Publishing the successful result
    Communication,
    /// Terminal: tests passed and the result was published
    Completed,
    /// Terminal: handed to a human with a recorded reason
    Escalated,
    /// Terminal: unrecoverable without any fix attempt succeeding
    Failed,
}

impl TicketStage {
    /// Whether this stage is terminal (no further attempts recorded)
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Escalated | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Communication => "communication",
            Self::Completed => "completed",
            Self::Escalated => "escalated",
            Self::Failed => "failed",
        }
    }
}

/// Reason recorded when automated retries stop and a human takes over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// The proposed patch's confidence score fell below the gate
    LowConfidence,
    /// Two consecutive attempts failed with the same fingerprint
    RepeatedFailurePattern,
    /// The retry budget was exhausted without a passing test run
    MaxRetriesReached,
}

impl EscalationReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowConfidence => "low_confidence",
            Self::RepeatedFailurePattern => "repeated_failure_pattern",
            Self::MaxRetriesReached => "max_retries_reached",
        }
    }
}

/// A ticket under active remediation
///
/// Created when the controller begins processing and owned exclusively
/// by the controller holding the ticket's lock. Removed from the active
/// set when the loop reaches a terminal stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Tracker-assigned identifier
    pub id: String,
    /// Current pipeline stage
    pub stage: TicketStage,
    /// Attempt counter, starting at 1
    pub attempt: u32,
    /// Confidence score per attempt, in order
    pub confidence_history: Vec<u8>,
    /// Fingerprint of the most recent failure, if any
    pub last_failure_fingerprint: Option<String>,
    /// Populated when the ticket reaches `Escalated`
    pub escalation_reason: Option<EscalationReason>,
}

impl Ticket {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stage: TicketStage::Planning,
            attempt: 1,
            confidence_history: Vec::new(),
            last_failure_fingerprint: None,
            escalation_reason: None,
        }
    }
}

/// One file's worth of proposed change: a path and its unified diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePatch {
    pub file_path: String,
    pub diff: String,
}

/// A change-set proposed by the developer collaborator for one attempt
///
/// Never mutated after validation; a new attempt produces a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedPatch {
    /// Generator-reported confidence, clamped to 0..=100
    pub confidence_score: u8,
    /// Paths the patch claims to touch
    pub patched_files: Vec<String>,
    /// Combined unified diff covering every file
    pub patch_content: String,
    /// Per-file diffs, when the generator supplied them separately
    #[serde(default)]
    pub patches: Vec<FilePatch>,
    /// Optional commit message suggested by the generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

impl ProposedPatch {
    /// Per-file patches, deriving them from the combined diff when the
    /// generator did not supply a per-file breakdown.
    #[must_use]
    pub fn file_patches(&self) -> Vec<FilePatch> {
        if !self.patches.is_empty() {
            return self.patches.clone();
        }
        self.patched_files
            .iter()
            .map(|path| FilePatch {
                file_path: path.clone(),
                diff: self.patch_content.clone(),
            })
            .collect()
    }
}

/// Outcome of an external test run for one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub passed: bool,
    pub execution_time_secs: f64,
    #[serde(default)]
    pub failure_summary: String,
    #[serde(default)]
    pub error_message: String,
}

impl TestReport {
    #[must_use]
    pub fn passing(execution_time_secs: f64) -> Self {
        Self {
            passed: true,
            execution_time_secs,
            failure_summary: String::new(),
            error_message: String::new(),
        }
    }

    #[must_use]
    pub fn failing(failure_summary: impl Into<String>) -> Self {
        Self {
            passed: false,
            execution_time_secs: 0.0,
            failure_summary: failure_summary.into(),
            error_message: String::new(),
        }
    }
}

/// Task plan produced by the planner collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    pub summary: String,
    pub affected_files: Vec<String>,
    pub error_classification: String,
}

/// One entry in a ticket's attempt history
///
/// Appended after each attempt and never mutated afterwards. Also the
/// shape of the per-ticket audit log (one JSON record per line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttemptRecord {
    pub attempt: u32,
    pub confidence_score: u8,
    pub tests_passed: bool,
    #[serde(default)]
    pub failure_summary: String,
    pub escalated: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Clamp an arbitrary integer confidence value into the 0..=100 range
#[must_use]
pub fn clamp_confidence(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}
