//! Transient session state for the two-step assignment flow: a user picks
//! an assignee, then confirms. Entries expire so the map stays bounded.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

pub(super) struct PendingAssignments {
    ttl: Duration,
    active_issue: Option<(u64, Instant)>,
    selections: HashMap<String, (String, Instant)>,
}

impl PendingAssignments {
    pub(super) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            active_issue: None,
            selections: HashMap::new(),
        }
    }

    fn prune(&mut self) {
        let ttl = self.ttl;
        self.selections
            .retain(|_, (_, inserted)| inserted.elapsed() < ttl);
        if let Some((_, inserted)) = &self.active_issue {
            if inserted.elapsed() >= ttl {
                self.active_issue = None;
            }
        }
    }

    /// Records the issue the next confirmed assignment applies to.
    pub(super) fn note_created_issue(&mut self, issue_number: u64) {
        self.prune();
        self.active_issue = Some((issue_number, Instant::now()));
    }

    pub(super) fn select(&mut self, user_id: &str, assignee: &str) {
        self.prune();
        self.selections
            .insert(user_id.to_string(), (assignee.to_string(), Instant::now()));
    }

    /// Resolves a confirmation to `(issue_number, assignee)` and clears the
    /// user's selection. Returns `None` when either half is missing or
    /// expired.
    pub(super) fn confirm(&mut self, user_id: &str) -> Option<(u64, String)> {
        self.prune();
        let (issue_number, _) = self.active_issue?;
        let (assignee, _) = self.selections.remove(user_id)?;
        Some((issue_number, assignee))
    }
}
