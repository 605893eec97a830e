//! Tracker-side event handling: webhook deliveries normalized by
//! stitch-github, applied against the mirror registry.

use stitch_core::correlation::extract_chat_reference;
use stitch_core::events::TrackerEvent;
use stitch_core::mirror_store::{CommentOrigin, MirrorComment, MirrorThread};
use stitch_core::render::render_chat_message;
use stitch_core::transition_guard::begin_engine_lock;

use super::BridgeRuntime;

impl BridgeRuntime {
    /// Applies one normalized tracker event. Chat-side failures are logged
    /// and leave the mirror record untouched.
    pub async fn handle_tracker_event(&self, event: TrackerEvent) {
        match event {
            TrackerEvent::IssueOpened {
                number,
                node_id,
                title,
                body,
                author_login,
                labels,
            } => {
                self.mirror_opened_issue(number, node_id, title, body, author_login, labels)
                    .await;
            }
            TrackerEvent::CommentCreated {
                node_id,
                comment_id,
                body,
                author_login,
            } => {
                self.mirror_tracker_comment(&node_id, comment_id, &body, &author_login)
                    .await;
            }
            TrackerEvent::IssueClosed { node_id } => {
                self.apply_issue_state(&node_id, true).await;
            }
            TrackerEvent::IssueReopened { node_id } => {
                self.apply_issue_state(&node_id, false).await;
            }
            TrackerEvent::IssueLocked { node_id } => {
                self.apply_issue_lock(&node_id, true).await;
            }
            TrackerEvent::IssueUnlocked { node_id } => {
                self.apply_issue_lock(&node_id, false).await;
            }
            TrackerEvent::IssueDeleted { node_id } => {
                self.tear_down_issue(&node_id).await;
            }
        }
    }

    /// A newly opened tracker issue. Bodies carrying a correlation fragment
    /// are echoes of issues this engine created; they are registered against
    /// the referenced thread instead of spawning a duplicate.
    async fn mirror_opened_issue(
        &self,
        number: u64,
        node_id: String,
        title: String,
        body: String,
        author_login: String,
        labels: Vec<String>,
    ) {
        if self.store.find_by_issue_node(&node_id).is_some() {
            return;
        }

        if let Some(reference) = extract_chat_reference(&body) {
            let chat_id = reference.channel_id.to_string();
            match self.store.get(&chat_id) {
                Some(existing) if existing.has_issue() => {}
                Some(_) => {
                    self.store.update(&chat_id, |entry| {
                        entry.issue_number = Some(number);
                        entry.issue_node_id = Some(node_id.clone());
                        entry.body = Some(body.clone());
                    });
                    println!(
                        "issue bridge correlated opened issue: chat_id={chat_id} issue=#{number}"
                    );
                }
                None => {
                    let mut thread = MirrorThread::new(chat_id.clone(), title);
                    thread.issue_number = Some(number);
                    thread.issue_node_id = Some(node_id);
                    thread.body = Some(body);
                    self.store.upsert(thread);
                    println!(
                        "issue bridge registered opened issue: chat_id={chat_id} issue=#{number}"
                    );
                }
            }
            return;
        }

        // Human-opened issue: mirror it as a new forum thread.
        let applied_tags = self.tags_for_labels(&labels);
        let rendered = render_chat_message(&author_login, &body);
        match self.chat.create_thread(&title, &rendered, &applied_tags).await {
            Ok(created) => {
                let mut thread = MirrorThread::new(created.chat_id.clone(), title);
                thread.issue_number = Some(number);
                thread.issue_node_id = Some(node_id);
                thread.body = Some(body);
                thread.applied_tags = applied_tags;
                self.store.upsert(thread);
                println!(
                    "issue bridge mirrored opened issue: chat_id={} issue=#{number}",
                    created.chat_id
                );
            }
            Err(error) => {
                eprintln!(
                    "issue bridge failed to mirror opened issue: issue=#{number}: {error:#}"
                );
            }
        }
    }

    async fn mirror_tracker_comment(
        &self,
        node_id: &str,
        comment_id: u64,
        body: &str,
        author_login: &str,
    ) {
        let Some(thread) = self.store.find_by_issue_node(node_id) else {
            return;
        };
        // A fragment-bearing body is the webhook echo of a comment this
        // engine created from a chat message.
        if extract_chat_reference(body).is_some() {
            return;
        }
        if thread.has_tracker_comment(comment_id) {
            return;
        }
        let rendered = render_chat_message(author_login, body);
        match self.chat.create_message(&thread.chat_id, &rendered).await {
            Ok(_) => {
                self.store.update(&thread.chat_id, |entry| {
                    entry.comments.push(MirrorComment {
                        origin: CommentOrigin::TrackerOriginated,
                        tracker_comment_id: comment_id,
                    });
                });
                println!(
                    "issue bridge mirrored tracker comment: chat_id={} comment={comment_id}",
                    thread.chat_id
                );
            }
            Err(error) => {
                eprintln!(
                    "issue bridge failed to mirror tracker comment: chat_id={} comment={comment_id}: {error:#}",
                    thread.chat_id
                );
            }
        }
    }

    /// Close/reopen from the tracker maps to archive/unarchive on the chat
    /// side. An incoming state equal to the record is the echo of a change
    /// this engine performed and is discarded.
    async fn apply_issue_state(&self, node_id: &str, archived: bool) {
        let Some(thread) = self.store.find_by_issue_node(node_id) else {
            return;
        };
        if thread.archived == archived {
            return;
        }
        let outcome = if archived {
            self.chat.archive_thread(&thread.chat_id).await
        } else {
            self.chat.unarchive_thread(&thread.chat_id).await
        };
        match outcome {
            Ok(()) => {
                self.store
                    .update(&thread.chat_id, |entry| entry.archived = archived);
                println!(
                    "issue bridge applied issue state: chat_id={} archived={archived}",
                    thread.chat_id
                );
            }
            Err(error) => {
                eprintln!(
                    "issue bridge failed to apply issue state: chat_id={}: {error:#}",
                    thread.chat_id
                );
            }
        }
    }

    async fn apply_issue_lock(&self, node_id: &str, locked: bool) {
        let Some(thread) = self.store.find_by_issue_node(node_id) else {
            return;
        };
        if thread.locked == locked {
            return;
        }
        let outcome = if locked {
            self.chat.lock_thread(&thread.chat_id).await
        } else {
            self.chat.unlock_thread(&thread.chat_id).await
        };
        match outcome {
            Ok(()) => {
                // The gateway will echo this flip back; mark it so the echo
                // is absorbed instead of round-tripping to the tracker.
                self.store.update(&thread.chat_id, |entry| {
                    entry.locked = locked;
                    entry.guard = begin_engine_lock(entry.guard);
                });
                println!(
                    "issue bridge applied issue lock: chat_id={} locked={locked}",
                    thread.chat_id
                );
            }
            Err(error) => {
                eprintln!(
                    "issue bridge failed to apply issue lock: chat_id={}: {error:#}",
                    thread.chat_id
                );
            }
        }
    }

    /// The tracker issue is gone; delete the mirror thread and forget the
    /// record even when the chat call fails.
    async fn tear_down_issue(&self, node_id: &str) {
        let Some(thread) = self.store.find_by_issue_node(node_id) else {
            return;
        };
        self.cancel_archive_debounce(&thread.chat_id);
        if let Err(error) = self.chat.delete_thread(&thread.chat_id).await {
            eprintln!(
                "issue bridge failed to delete mirror thread: chat_id={}: {error:#}",
                thread.chat_id
            );
        }
        self.store.remove(&thread.chat_id);
        println!(
            "issue bridge removed mirrored issue: chat_id={} node_id={node_id}",
            thread.chat_id
        );
    }
}
