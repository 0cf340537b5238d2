//! End-to-end runs through the public API
//!
//! Wires the controller to in-memory collaborators and drives whole
//! tickets through the pipeline, checking terminal states, lock
//! hygiene, and the audit log.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use remedy::{
    Developer, EscalationReason, FixAttemptRecord, FixController, LockManager, Notifier, Planner,
    Qa, RemedyConfig, RepoContent, RunOutcome, Scheduler, TaskPlan, TestReport, Ticket,
    TicketStage,
};
use remedy_patch::AppliedFile;
use remedy_utils::error::ControllerError;
use remedy_utils::paths;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ORIGINAL: &str = "def f():\n    return 1\n";
const DIFF: &str = "--- a/src/calc.py\n+++ b/src/calc.py\n@@ -1,2 +1,2 @@\n def f():\n-    return 1\n+    return 2\n";

struct HomeGuard {
    _tmp: tempfile::TempDir,
}

impl Drop for HomeGuard {
    fn drop(&mut self) {
        paths::set_thread_home(None);
    }
}

fn isolated_home() -> HomeGuard {
    let tmp = tempfile::tempdir().unwrap();
    let home = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
    paths::set_thread_home(Some(home));
    HomeGuard { _tmp: tmp }
}

struct FixedPlanner;

#[async_trait]
impl Planner for FixedPlanner {
    async fn analyze(&self, _ticket: &Ticket) -> Result<TaskPlan, ControllerError> {
        Ok(TaskPlan {
            summary: "wrong constant returned".to_string(),
            affected_files: vec!["src/calc.py".to_string()],
            error_classification: "logic_error".to_string(),
        })
    }
}

struct FixedDeveloper {
    payload: Value,
}

#[async_trait]
impl Developer for FixedDeveloper {
    async fn propose_patch(
        &self,
        _plan: &TaskPlan,
        _history: &[FixAttemptRecord],
    ) -> Result<Value, ControllerError> {
        Ok(self.payload.clone())
    }
}

struct FixedQa {
    report: TestReport,
}

#[async_trait]
impl Qa for FixedQa {
    async fn run(&self, _applied: &[AppliedFile]) -> Result<TestReport, ControllerError> {
        Ok(self.report.clone())
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn all(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for EventLog {
    async fn progress(
        &self,
        ticket_id: &str,
        attempt: u32,
        _confidence: u8,
        _report: &TestReport,
    ) -> Result<(), ControllerError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("progress:{ticket_id}:{attempt}"));
        Ok(())
    }

    async fn escalate(
        &self,
        ticket_id: &str,
        _attempt: u32,
        reason: EscalationReason,
    ) -> Result<(), ControllerError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("escalate:{ticket_id}:{}", reason.as_str()));
        Ok(())
    }

    async fn success(
        &self,
        ticket_id: &str,
        _attempt: u32,
        _applied: &[AppliedFile],
    ) -> Result<(), ControllerError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("success:{ticket_id}"));
        Ok(())
    }
}

struct SharedRepo {
    files: Mutex<HashMap<String, String>>,
}

impl SharedRepo {
    fn seeded() -> Self {
        let mut files = HashMap::new();
        files.insert("src/calc.py".to_string(), ORIGINAL.to_string());
        Self {
            files: Mutex::new(files),
        }
    }

    fn read(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl RepoContent for SharedRepo {
    async fn get_file(&self, path: &str) -> Result<Option<String>, ControllerError> {
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn commit(
        &self,
        path: &str,
        content: &str,
        _message: &str,
    ) -> Result<bool, ControllerError> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(true)
    }
}

fn controller(
    payload: Value,
    report: TestReport,
    notifier: Arc<EventLog>,
    repo: Arc<SharedRepo>,
) -> FixController {
    FixController::new(
        RemedyConfig::default(),
        Arc::new(FixedPlanner),
        Arc::new(FixedDeveloper { payload }),
        Arc::new(FixedQa { report }),
        notifier as Arc<dyn Notifier>,
        repo as Arc<dyn RepoContent>,
    )
}

fn good_payload() -> Value {
    json!({
        "confidence_score": 92,
        "patch_content": DIFF,
        "patched_files": ["src/calc.py"],
        "commit_message": "fix: return the right constant"
    })
}

#[tokio::test]
async fn full_pipeline_success() {
    let _home = isolated_home();
    let notifier = Arc::new(EventLog::default());
    let repo = Arc::new(SharedRepo::seeded());
    let controller = controller(
        good_payload(),
        TestReport::passing(0.4),
        Arc::clone(&notifier),
        Arc::clone(&repo),
    );

    let outcome = controller.run("TICKET-100").await.unwrap();
    let RunOutcome::Finished(ticket) = outcome else {
        panic!("expected a finished run");
    };

    assert_eq!(ticket.stage, TicketStage::Completed);
    assert_eq!(
        repo.read("src/calc.py").unwrap(),
        "def f():\n    return 2\n"
    );
    assert_eq!(notifier.all(), vec!["success:TICKET-100"]);

    // Audit log has exactly one passing record.
    let log = std::fs::read_to_string(paths::attempt_log_path("TICKET-100")).unwrap();
    let records: Vec<Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["tests_passed"], json!(true));

    // The lock artifact is gone.
    assert!(!LockManager::exists("TICKET-100"));
}

#[tokio::test]
async fn ticket_reaches_exactly_one_terminal_state() {
    let _home = isolated_home();
    let notifier = Arc::new(EventLog::default());
    let repo = Arc::new(SharedRepo::seeded());
    let controller = controller(
        good_payload(),
        TestReport::failing("E501 line too long in calc.py at line 3, column 80 exceeded"),
        Arc::clone(&notifier),
        Arc::clone(&repo),
    );

    let outcome = controller.run("TICKET-101").await.unwrap();
    let RunOutcome::Finished(ticket) = outcome else {
        panic!("expected a finished run");
    };

    // Identical failure text on consecutive attempts trips the
    // repeated-failure rule on attempt 2.
    assert_eq!(ticket.stage, TicketStage::Escalated);
    assert_eq!(
        ticket.escalation_reason,
        Some(EscalationReason::RepeatedFailurePattern)
    );
    assert!(ticket.stage.is_terminal());

    let log = std::fs::read_to_string(paths::attempt_log_path("TICKET-101")).unwrap();
    assert_eq!(log.lines().count(), 2);
    let events = notifier.all();
    assert_eq!(
        events.iter().filter(|e| e.starts_with("escalate:")).count(),
        1
    );
}

#[tokio::test]
async fn scheduler_processes_queued_tickets() {
    let _home = isolated_home();
    let notifier = Arc::new(EventLog::default());
    let repo = Arc::new(SharedRepo::seeded());
    let controller = Arc::new(controller(
        good_payload(),
        TestReport::passing(0.2),
        Arc::clone(&notifier),
        Arc::clone(&repo),
    ));

    let mut scheduler = Scheduler::new(controller);
    assert!(scheduler.enqueue("TICKET-200"));
    assert!(scheduler.enqueue("TICKET-201"));
    assert!(!scheduler.enqueue("TICKET-200"));

    let results = scheduler.run_pending().await;
    assert_eq!(results.len(), 2);
    for (ticket_id, result) in results {
        match result.unwrap() {
            RunOutcome::Finished(ticket) => {
                assert_eq!(ticket.stage, TicketStage::Completed, "{ticket_id}");
            }
            RunOutcome::Skipped => panic!("{ticket_id} unexpectedly skipped"),
        }
    }
    assert!(scheduler.registry().is_empty());
}

#[tokio::test]
async fn contended_ticket_is_skipped_and_lock_survives() {
    let _home = isolated_home();
    let manager = LockManager::default();
    let held = manager
        .acquire("TICKET-300", Duration::ZERO)
        .unwrap()
        .expect("first acquire succeeds");

    let notifier = Arc::new(EventLog::default());
    let repo = Arc::new(SharedRepo::seeded());
    let controller = controller(
        good_payload(),
        TestReport::passing(0.1),
        Arc::clone(&notifier),
        Arc::clone(&repo),
    );

    let outcome = controller.run("TICKET-300").await.unwrap();
    assert!(matches!(outcome, RunOutcome::Skipped));
    assert!(notifier.all().is_empty());
    assert!(LockManager::exists("TICKET-300"));

    held.release().unwrap();
    assert!(!LockManager::exists("TICKET-300"));
}
