//! The per-ticket fix loop
//!
//! Drives one ticket through planning, patch generation, application,
//! and testing, with bounded retries and two early-escalation rules:
//! a confidence gate before any test run, and a repeated-failure check
//! comparing consecutive failure fingerprints. The ticket lock is held
//! for the whole run and released on every exit path.

use chrono::{DateTime, Utc};
use remedy_config::RemedyConfig;
use remedy_lock::LockManager;
use remedy_model::{
    EscalationReason, FixAttemptRecord, ProposedPatch, TaskPlan, TestReport, Ticket, TicketStage,
};
use remedy_patch::{AppliedFile, EngineConfig, PatchEngine, content_hash_first8};
use remedy_utils::error::{ControllerError, RemedyError};
use remedy_utils::{fs as remedy_fs, logging, paths};
use remedy_validation::PatchValidator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, warn};

use crate::adapter::normalize_patch_payload;
use crate::collaborators::{Developer, Notifier, Planner, Qa, RepoContent};

/// What a controller run produced for one ticket
#[derive(Debug)]
pub enum RunOutcome {
    /// Another worker holds the lock; nothing was touched
    Skipped,
    /// The loop ran to a terminal stage
    Finished(Ticket),
}

/// Orchestrates the retry loop for individual tickets
///
/// One instance serves many tickets; all per-ticket state lives in the
/// [`Ticket`] value owned by each run.
pub struct FixController {
    config: RemedyConfig,
    locks: LockManager,
    engine: PatchEngine,
    validator: PatchValidator,
    planner: Arc<dyn Planner>,
    developer: Arc<dyn Developer>,
    qa: Arc<dyn Qa>,
    notifier: Arc<dyn Notifier>,
    repo: Arc<dyn RepoContent>,
}

impl FixController {
    pub fn new(
        config: RemedyConfig,
        planner: Arc<dyn Planner>,
        developer: Arc<dyn Developer>,
        qa: Arc<dyn Qa>,
        notifier: Arc<dyn Notifier>,
        repo: Arc<dyn RepoContent>,
    ) -> Self {
        let locks = LockManager::new(Duration::from_secs(config.lock_ttl_secs));
        let engine = PatchEngine::new(EngineConfig {
            tool_timeout: Duration::from_secs(config.apply_tool_timeout_secs),
            ..EngineConfig::default()
        });
        Self {
            config,
            locks,
            engine,
            validator: PatchValidator::new(),
            planner,
            developer,
            qa,
            notifier,
            repo,
        }
    }

    /// Replace the default validator, e.g. with a repository listing
    #[must_use]
    pub fn with_validator(mut self, validator: PatchValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Process one ticket end to end
    ///
    /// Returns [`RunOutcome::Skipped`] without touching any state when
    /// the ticket lock is held elsewhere. The lock is released on every
    /// other path, including errors.
    pub async fn run(&self, ticket_id: &str) -> Result<RunOutcome, RemedyError> {
        let span = logging::ticket_span(ticket_id);
        async {
            let Some(lock) = self.locks.acquire(ticket_id, Duration::ZERO)? else {
                info!("ticket locked by another worker, skipping");
                return Ok(RunOutcome::Skipped);
            };

            if paths::attempt_log_path(ticket_id).exists() {
                // A reclaimed ticket restarts from attempt 1; prior
                // records stay in the log for audit.
                warn!("prior attempt log found, restarting with fresh history");
            }

            let result = self.run_locked(ticket_id).await;
            if let Err(e) = lock.release() {
                warn!(error = %e, "failed to release ticket lock");
            }
            result.map(RunOutcome::Finished)
        }
        .instrument(span)
        .await
    }

    async fn run_locked(&self, ticket_id: &str) -> Result<Ticket, RemedyError> {
        let mut ticket = Ticket::new(ticket_id);

        let plan = match self.obtain_plan(&ticket).await {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "planning failed, ticket cannot proceed");
                ticket.stage = TicketStage::Failed;
                return Ok(ticket);
            }
        };
        info!(
            files = plan.affected_files.len(),
            classification = %plan.error_classification,
            "plan obtained"
        );

        let mut history: Vec<FixAttemptRecord> = Vec::new();
        loop {
            let span = logging::attempt_span(&ticket.id, ticket.attempt);
            let keep_going = self
                .run_attempt(&mut ticket, &plan, &mut history)
                .instrument(span)
                .await;
            if !keep_going {
                return Ok(ticket);
            }
        }
    }

    async fn obtain_plan(&self, ticket: &Ticket) -> Result<TaskPlan, ControllerError> {
        let plan = self.planner.analyze(ticket).await?;
        let checks = [
            ("summary", plan.summary.trim().is_empty()),
            ("affected_files", plan.affected_files.is_empty()),
            (
                "error_classification",
                plan.error_classification.trim().is_empty(),
            ),
        ];
        for (field, missing) in checks {
            if missing {
                return Err(ControllerError::IncompletePlan {
                    ticket_id: ticket.id.clone(),
                    field: field.to_string(),
                });
            }
        }
        Ok(plan)
    }

    /// One pass through the retry loop; returns whether to keep looping
    async fn run_attempt(
        &self,
        ticket: &mut Ticket,
        plan: &TaskPlan,
        history: &mut Vec<FixAttemptRecord>,
    ) -> bool {
        let started_at = Utc::now();
        ticket.stage = TicketStage::Development;

        let patch = match self.generate_patch(plan, history).await {
            Ok(patch) => patch,
            Err(e) => {
                warn!(error = %e, "patch generation failed, consuming one attempt");
                let report = TestReport::failing(format!("patch generation failed: {e}"));
                return self
                    .handle_failed_attempt(ticket, history, 0, &report, started_at)
                    .await;
            }
        };

        // Confidence gate. A validation rejection is treated exactly
        // like a low-confidence patch.
        let assessment = self.validator.assess(&patch);
        let confidence = if assessment.valid {
            patch.confidence_score
        } else {
            assessment.confidence
        };
        ticket.confidence_history.push(confidence);

        if !assessment.valid || confidence < self.config.confidence_threshold {
            let summary = if assessment.valid {
                format!(
                    "confidence {confidence} below threshold {}",
                    self.config.confidence_threshold
                )
            } else {
                assessment.rejection_reasons().join("; ")
            };
            warn!(confidence, %summary, "stopping before any test run");
            self.record_attempt(ticket, history, confidence, false, summary, true, started_at);
            self.finish_escalated(ticket, EscalationReason::LowConfidence)
                .await;
            return false;
        }

        let applied = match self.apply_patch(&ticket.id, &patch).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!(error = %e, "patch application failed, no tests run");
                let report = TestReport::failing(format!("apply failed: {e}"));
                return self
                    .handle_failed_attempt(ticket, history, confidence, &report, started_at)
                    .await;
            }
        };

        ticket.stage = TicketStage::Testing;
        let report = self.run_tests(&applied).await;

        if report.passed {
            ticket.stage = TicketStage::Communication;
            info!(attempt = ticket.attempt, "tests passed, publishing result");
            if let Err(e) = self
                .notifier
                .success(&ticket.id, ticket.attempt, &applied)
                .await
            {
                warn!(error = %e, "success notification failed");
            }
            self.record_attempt(ticket, history, confidence, true, String::new(), false, started_at);
            // A later regression is a fresh problem, not a continuation.
            history.clear();
            ticket.last_failure_fingerprint = None;
            ticket.stage = TicketStage::Completed;
            return false;
        }

        self.handle_failed_attempt(ticket, history, confidence, &report, started_at)
            .await
    }

    async fn generate_patch(
        &self,
        plan: &TaskPlan,
        history: &[FixAttemptRecord],
    ) -> Result<ProposedPatch, ControllerError> {
        let payload = self.developer.propose_patch(plan, history).await?;
        normalize_patch_payload(&payload, self.config.default_confidence)
    }

    /// Apply every file of the patch and commit the results
    async fn apply_patch(
        &self,
        ticket_id: &str,
        patch: &ProposedPatch,
    ) -> Result<Vec<AppliedFile>, ControllerError> {
        let message = patch
            .commit_message
            .clone()
            .unwrap_or_else(|| format!("remedy: automated fix for {ticket_id}"));

        let mut applied = Vec::new();
        for entry in patch.file_patches() {
            let original = self.repo.get_file(&entry.file_path).await?;
            let outcome = self.engine.apply(original.as_deref(), &entry.diff, None);
            if !outcome.success {
                return Err(ControllerError::CollaboratorFailed {
                    collaborator: "patch_engine".to_string(),
                    reason: format!("no strategy could apply the diff for '{}'", entry.file_path),
                });
            }
            debug!(
                path = %entry.file_path,
                strategy = outcome.strategy.as_str(),
                "file patched"
            );

            let committed = self
                .repo
                .commit(&entry.file_path, &outcome.content, &message)
                .await?;
            if !committed {
                warn!(path = %entry.file_path, "commit reported no change");
            }
            applied.push(AppliedFile {
                path: entry.file_path,
                blake3_first8: content_hash_first8(&outcome.content),
                applied: true,
                strategy: outcome.strategy,
                warnings: Vec::new(),
            });
        }
        Ok(applied)
    }

    /// Run QA under the configured timeout; a timeout is a failed run
    async fn run_tests(&self, applied: &[AppliedFile]) -> TestReport {
        let budget = Duration::from_secs(self.config.test_timeout_secs);
        match tokio::time::timeout(budget, self.qa.run(applied)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => TestReport::failing(format!("test execution error: {e}")),
            Err(_) => {
                warn!(timeout_secs = self.config.test_timeout_secs, "test run timed out");
                TestReport::failing("timeout")
            }
        }
    }

    /// Record a failed attempt and decide what happens next
    ///
    /// Escalates on a repeated failure fingerprint or an exhausted
    /// retry budget; otherwise publishes progress and advances the
    /// attempt counter. Returns whether the loop continues.
    async fn handle_failed_attempt(
        &self,
        ticket: &mut Ticket,
        history: &mut Vec<FixAttemptRecord>,
        confidence: u8,
        report: &TestReport,
        started_at: DateTime<Utc>,
    ) -> bool {
        let summary = if report.failure_summary.is_empty() {
            report.error_message.clone()
        } else {
            report.failure_summary.clone()
        };
        let fingerprint = failure_fingerprint(&summary, self.config.failure_fingerprint_len);
        let repeated = !fingerprint.is_empty()
            && ticket.last_failure_fingerprint.as_deref() == Some(fingerprint.as_str());
        let exhausted = ticket.attempt >= self.config.max_retries;

        self.record_attempt(
            ticket,
            history,
            confidence,
            false,
            summary,
            repeated || exhausted,
            started_at,
        );

        if repeated {
            info!("consecutive attempts failed identically");
            self.finish_escalated(ticket, EscalationReason::RepeatedFailurePattern)
                .await;
            return false;
        }
        if exhausted {
            self.finish_escalated(ticket, EscalationReason::MaxRetriesReached)
                .await;
            return false;
        }

        ticket.last_failure_fingerprint = Some(fingerprint);
        if let Err(e) = self
            .notifier
            .progress(&ticket.id, ticket.attempt, confidence, report)
            .await
        {
            warn!(error = %e, "progress notification failed");
        }
        ticket.attempt += 1;
        true
    }

    async fn finish_escalated(&self, ticket: &mut Ticket, reason: EscalationReason) {
        ticket.escalation_reason = Some(reason);
        ticket.stage = TicketStage::Escalated;
        info!(reason = reason.as_str(), "ticket escalated");
        if let Err(e) = self
            .notifier
            .escalate(&ticket.id, ticket.attempt, reason)
            .await
        {
            warn!(error = %e, "escalation notification failed");
        }
    }

    /// Append one record to the in-memory history and the audit log
    #[allow(clippy::too_many_arguments)]
    fn record_attempt(
        &self,
        ticket: &Ticket,
        history: &mut Vec<FixAttemptRecord>,
        confidence: u8,
        tests_passed: bool,
        failure_summary: String,
        escalated: bool,
        started_at: DateTime<Utc>,
    ) {
        let record = FixAttemptRecord {
            attempt: ticket.attempt,
            confidence_score: confidence,
            tests_passed,
            failure_summary,
            escalated,
            started_at,
            finished_at: Utc::now(),
        };

        match serde_json::to_string(&record) {
            Ok(line) => {
                if let Err(e) = remedy_fs::append_line(&paths::attempt_log_path(&ticket.id), &line)
                {
                    warn!(error = %e, "failed to append attempt record");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize attempt record"),
        }
        history.push(record);
    }
}

/// Fixed-length prefix of the failure text, used for rule B matching
///
/// Deliberately crude: the prefix length is configurable because this
/// heuristic can both over- and under-match depending on how much
/// harness banner the failure text carries.
fn failure_fingerprint(text: &str, len: usize) -> String {
    text.chars().take(len).collect()
}
