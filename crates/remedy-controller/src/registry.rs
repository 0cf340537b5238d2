//! Ticket scheduling
//!
//! The set of tickets being worked on is an explicit value owned by
//! the scheduler, never process-global state, so several schedulers
//! can coexist in one process without seeing each other's tickets.
//! Cross-process exclusion is the lock manager's job, not this one's.

use remedy_utils::error::RemedyError;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::warn;

use crate::controller::{FixController, RunOutcome};

/// The tickets a scheduler currently has in flight or queued
#[derive(Debug, Default)]
pub struct TicketRegistry {
    active: BTreeSet<String>,
}

impl TicketRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ticket; returns false if it was already registered
    pub fn insert(&mut self, ticket_id: &str) -> bool {
        self.active.insert(ticket_id.to_string())
    }

    pub fn remove(&mut self, ticket_id: &str) -> bool {
        self.active.remove(ticket_id)
    }

    #[must_use]
    pub fn contains(&self, ticket_id: &str) -> bool {
        self.active.contains(ticket_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.active).into_iter().collect()
    }
}

/// Runs one controller task per queued ticket
pub struct Scheduler {
    controller: Arc<FixController>,
    registry: TicketRegistry,
}

impl Scheduler {
    #[must_use]
    pub fn new(controller: Arc<FixController>) -> Self {
        Self {
            controller,
            registry: TicketRegistry::new(),
        }
    }

    /// Queue a ticket; duplicates are rejected
    pub fn enqueue(&mut self, ticket_id: &str) -> bool {
        self.registry.insert(ticket_id)
    }

    #[must_use]
    pub fn registry(&self) -> &TicketRegistry {
        &self.registry
    }

    /// Process every queued ticket concurrently, one task each
    ///
    /// Tickets share nothing but the lock directory; a ticket whose
    /// lock is held elsewhere comes back as [`RunOutcome::Skipped`].
    pub async fn run_pending(&mut self) -> Vec<(String, Result<RunOutcome, RemedyError>)> {
        let mut tasks = JoinSet::new();
        for ticket_id in self.registry.drain() {
            let controller = Arc::clone(&self.controller);
            tasks.spawn(async move {
                let outcome = controller.run(&ticket_id).await;
                (ticket_id, outcome)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => warn!(error = %e, "ticket task panicked or was cancelled"),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = TicketRegistry::new();
        assert!(registry.insert("BUG-1"));
        assert!(!registry.insert("BUG-1"));
        assert!(registry.insert("BUG-2"));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove("BUG-1"));
        assert!(!registry.contains("BUG-1"));
        assert!(registry.contains("BUG-2"));
    }

    #[test]
    fn drain_empties_the_registry() {
        let mut registry = TicketRegistry::new();
        registry.insert("BUG-2");
        registry.insert("BUG-1");

        let drained = registry.drain();
        assert_eq!(drained, vec!["BUG-1", "BUG-2"]);
        assert!(registry.is_empty());
    }
}
