//! Collaborator contracts consumed by the fix controller
//!
//! Everything the controller needs from the outside world comes in
//! through these traits: planning, patch generation, test execution,
//! user-facing messaging, and repository content access. The real
//! implementations wrap tracker and source-host APIs; tests substitute
//! in-memory doubles.

use async_trait::async_trait;
use remedy_model::{EscalationReason, FixAttemptRecord, TaskPlan, TestReport, Ticket};
use remedy_patch::AppliedFile;
use remedy_utils::error::ControllerError;

/// Produces a task plan for a ticket
///
/// A planner failure is fatal for the ticket; no retries are spent on
/// a plan that never materialized.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn analyze(&self, ticket: &Ticket) -> Result<TaskPlan, ControllerError>;
}

/// Generates a proposed patch for one attempt
///
/// The payload is deliberately loose JSON: generators disagree about
/// shape, so normalization happens once at the controller boundary
/// (see [`crate::adapter`]). `history` carries every prior attempt so
/// the generator can avoid repeating a failing approach.
#[async_trait]
pub trait Developer: Send + Sync {
    async fn propose_patch(
        &self,
        plan: &TaskPlan,
        history: &[FixAttemptRecord],
    ) -> Result<serde_json::Value, ControllerError>;
}

/// Runs the external test suite against an applied change
#[async_trait]
pub trait Qa: Send + Sync {
    async fn run(&self, applied: &[AppliedFile]) -> Result<TestReport, ControllerError>;
}

/// Sink for all user-facing messaging
///
/// The controller only emits structured events; turning them into
/// tracker comments or host statuses is this collaborator's job.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn progress(
        &self,
        ticket_id: &str,
        attempt: u32,
        confidence: u8,
        report: &TestReport,
    ) -> Result<(), ControllerError>;

    async fn escalate(
        &self,
        ticket_id: &str,
        attempt: u32,
        reason: EscalationReason,
    ) -> Result<(), ControllerError>;

    async fn success(
        &self,
        ticket_id: &str,
        attempt: u32,
        applied: &[AppliedFile],
    ) -> Result<(), ControllerError>;
}

/// Read and write access to repository file content
#[async_trait]
pub trait RepoContent: Send + Sync {
    /// Current content of `path`, or `None` if the file does not exist
    async fn get_file(&self, path: &str) -> Result<Option<String>, ControllerError>;

    /// Persist new content for `path`; returns whether a change landed
    async fn commit(
        &self,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<bool, ControllerError>;
}
