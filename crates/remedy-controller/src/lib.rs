//! Fix-attempt orchestration
//!
//! Owns the per-ticket retry loop: lock acquisition, planning, patch
//! generation and application, test runs, and the escalation rules
//! that stop automation and hand a ticket to a human. External systems
//! are reached only through the collaborator traits in
//! [`collaborators`].

pub mod adapter;
pub mod collaborators;
pub mod controller;
pub mod registry;

pub use adapter::normalize_patch_payload;
pub use collaborators::{Developer, Notifier, Planner, Qa, RepoContent};
pub use controller::{FixController, RunOutcome};
pub use registry::{Scheduler, TicketRegistry};
