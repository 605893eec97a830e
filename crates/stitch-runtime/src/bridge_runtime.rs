//! Bridge runtime: owns the mirror store, applies normalized events from
//! both platforms, and runs the startup reconciliation pass.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use stitch_core::events::ChatEvent;
use stitch_core::mirror_store::MirrorStore;
use stitch_core::platform::{ChatPlatform, ForumTag, IssueTracker};
use stitch_core::transition_guard::{react_to_archive_timer, ArchiveReaction};

mod chat_events;
mod pending_assignments;
mod reconcile;
mod tracker_events;
mod webhook_server;

#[cfg(test)]
mod tests;

use pending_assignments::PendingAssignments;
pub use webhook_server::{build_webhook_router, run_webhook_server};

#[derive(Debug, Clone)]
/// Runtime configuration for the mirror bridge.
pub struct BridgeRuntimeConfig {
    /// Forum channel whose threads are mirrored; events outside it are
    /// ignored.
    pub forum_channel_id: String,
    pub guild_id: u64,
    /// `owner/repo`, used for issue links in announcements.
    pub repo_slug: String,
    /// Delay before reacting to an archive-state change; absorbs the
    /// unlock-then-archive burst Discord emits for locked threads.
    pub archive_debounce: Duration,
    /// How long a pending assignee selection stays valid.
    pub assignment_ttl: Duration,
}

impl Default for BridgeRuntimeConfig {
    fn default() -> Self {
        Self {
            forum_channel_id: String::new(),
            guild_id: 0,
            repo_slug: String::new(),
            archive_debounce: Duration::from_millis(500),
            assignment_ttl: Duration::from_secs(300),
        }
    }
}

pub struct BridgeRuntime {
    config: BridgeRuntimeConfig,
    chat: Arc<dyn ChatPlatform>,
    tracker: Arc<dyn IssueTracker>,
    store: MirrorStore,
    forum_tags: Mutex<Vec<ForumTag>>,
    debounce_tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    assignments: Mutex<PendingAssignments>,
}

impl BridgeRuntime {
    pub fn new(
        config: BridgeRuntimeConfig,
        chat: Arc<dyn ChatPlatform>,
        tracker: Arc<dyn IssueTracker>,
    ) -> Self {
        let assignment_ttl = config.assignment_ttl;
        Self {
            config,
            chat,
            tracker,
            store: MirrorStore::new(),
            forum_tags: Mutex::new(Vec::new()),
            debounce_tasks: Mutex::new(HashMap::new()),
            assignments: Mutex::new(PendingAssignments::new(assignment_ttl)),
        }
    }

    pub fn store(&self) -> &MirrorStore {
        &self.store
    }

    pub fn config(&self) -> &BridgeRuntimeConfig {
        &self.config
    }

    /// Refreshes the forum tag table used to translate tag ids to tracker
    /// labels. A fetch failure is logged and leaves the previous table.
    pub async fn refresh_forum_tags(&self) {
        match self.chat.forum_tags().await {
            Ok(tags) => {
                *self.lock_forum_tags() = tags;
            }
            Err(error) => {
                eprintln!("issue bridge failed to fetch forum tags: {error:#}");
            }
        }
    }

    fn lock_forum_tags(&self) -> std::sync::MutexGuard<'_, Vec<ForumTag>> {
        match self.forum_tags.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_assignments(&self) -> std::sync::MutexGuard<'_, PendingAssignments> {
        match self.assignments.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_debounce_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        match self.debounce_tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Tag ids applied to a thread, translated to tracker label names.
    fn labels_for_tags(&self, applied_tags: &[String]) -> Vec<String> {
        let tags = self.lock_forum_tags();
        applied_tags
            .iter()
            .filter_map(|tag_id| {
                tags.iter()
                    .find(|tag| &tag.id == tag_id)
                    .map(|tag| tag.name.clone())
            })
            .collect()
    }

    /// Tracker label names translated back to forum tag ids; labels with no
    /// matching tag are dropped.
    fn tags_for_labels(&self, labels: &[String]) -> Vec<String> {
        let tags = self.lock_forum_tags();
        labels
            .iter()
            .filter_map(|label| {
                tags.iter()
                    .find(|tag| &tag.name == label)
                    .map(|tag| tag.id.clone())
            })
            .collect()
    }

    /// Consumes normalized chat events until the channel closes. Each event
    /// is handled in its own task so one suspended remote call never stalls
    /// the events behind it; handlers are idempotent against the reordering
    /// this allows.
    pub async fn run_chat_event_loop(self: Arc<Self>, mut events_rx: mpsc::Receiver<ChatEvent>) {
        while let Some(event) = events_rx.recv().await {
            let runtime = Arc::clone(&self);
            tokio::spawn(async move {
                runtime.handle_chat_event(event).await;
            });
        }
    }

    /// Schedules (or reschedules) the deferred archive reaction for a
    /// thread. The previous timer, if any, is aborted so only the latest
    /// observed archive state is acted on.
    pub(crate) fn schedule_archive_debounce(&self, chat_id: String, incoming_archived: bool) {
        let store = self.store.clone();
        let tracker = Arc::clone(&self.tracker);
        let delay = self.config.archive_debounce;
        let task_chat_id = chat_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire_archive_debounce(&store, tracker.as_ref(), &task_chat_id, incoming_archived)
                .await;
        });
        let mut tasks = self.lock_debounce_tasks();
        if let Some(previous) = tasks.insert(chat_id, handle) {
            previous.abort();
        }
    }

    /// Cancels any pending archive reaction for a removed thread.
    pub(crate) fn cancel_archive_debounce(&self, chat_id: &str) {
        if let Some(handle) = self.lock_debounce_tasks().remove(chat_id) {
            handle.abort();
        }
    }
}

async fn fire_archive_debounce(
    store: &MirrorStore,
    tracker: &dyn IssueTracker,
    chat_id: &str,
    incoming_archived: bool,
) {
    // The thread may have been deleted while the timer was pending; a
    // post-deletion firing is a silent no-op.
    let Some(thread) = store.get(chat_id) else {
        return;
    };
    let (next_phase, reaction) = react_to_archive_timer(thread.guard, incoming_archived);
    store.update(chat_id, |entry| entry.guard = next_phase);
    match reaction {
        ArchiveReaction::Cancelled => {
            println!(
                "issue bridge absorbed archive burst: chat_id={chat_id} archived={incoming_archived}"
            );
        }
        ArchiveReaction::Propagate { archived } => {
            if thread.archived == archived {
                return;
            }
            let Some(issue_number) = thread.issue_number else {
                eprintln!(
                    "issue bridge cannot propagate archive change: chat_id={chat_id} has no issue number"
                );
                return;
            };
            match tracker.set_issue_state(issue_number, !archived).await {
                Ok(()) => {
                    store.update(chat_id, |entry| entry.archived = archived);
                    println!(
                        "issue bridge propagated archive change: chat_id={chat_id} issue=#{issue_number} archived={archived}"
                    );
                }
                Err(error) => {
                    eprintln!(
                        "issue bridge failed to update issue state: chat_id={chat_id} issue=#{issue_number}: {error:#}"
                    );
                }
            }
        }
    }
}
