//! remedy — automated bug-ticket remediation
//!
//! Given a ticket, remedy drives an analyze → patch → test → publish
//! pipeline with bounded retries, a confidence gate, and escalation to
//! a human when automation stops making progress. The workspace splits
//! into focused crates; this facade re-exports the pieces a consumer
//! or the CLI needs.

pub mod cli;

pub use remedy_config::RemedyConfig;
pub use remedy_controller::{
    Developer, FixController, Notifier, Planner, Qa, RepoContent, RunOutcome, Scheduler,
    TicketRegistry, normalize_patch_payload,
};
pub use remedy_lock::{LockManager, LockStamp, TicketLock};
pub use remedy_model::{
    EscalationReason, FilePatch, FixAttemptRecord, ProposedPatch, TaskPlan, TestReport, Ticket,
    TicketStage, clamp_confidence,
};
pub use remedy_patch::{
    AppliedFile, ApplyStrategy, EngineConfig, PatchEngine, PatchOutcome, parse_diff,
};
pub use remedy_utils::error::RemedyError;
pub use remedy_validation::{FileReport, PatchAssessment, PatchValidator};
