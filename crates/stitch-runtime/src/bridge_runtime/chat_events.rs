//! Chat-side event handling: thread lifecycle, message mirroring, and the
//! assignment interaction flow.

use stitch_core::correlation::ChatMessageRef;
use stitch_core::events::{ChatAttachment, ChatEvent};
use stitch_core::mirror_store::{CommentOrigin, MirrorComment, MirrorThread};
use stitch_core::render::{render_issue_announcement, render_tracker_body};
use stitch_core::transition_guard::{react_to_lock_signal, LockReaction};

use super::BridgeRuntime;

impl BridgeRuntime {
    /// Applies one normalized chat event. Failures are logged and leave the
    /// mirror record untouched; nothing here is fatal to the event loop.
    pub(super) async fn handle_chat_event(&self, event: ChatEvent) {
        match event {
            ChatEvent::ThreadCreated {
                chat_id,
                parent_id,
                title,
                applied_tags,
            } => {
                if parent_id != self.config.forum_channel_id {
                    return;
                }
                self.register_thread(chat_id, title, applied_tags);
            }
            ChatEvent::ThreadUpdated {
                chat_id,
                parent_id,
                locked,
                archived,
            } => {
                if parent_id != self.config.forum_channel_id {
                    return;
                }
                self.apply_thread_update(&chat_id, locked, archived).await;
            }
            ChatEvent::ThreadDeleted { chat_id, parent_id } => {
                if parent_id != self.config.forum_channel_id {
                    return;
                }
                self.tear_down_thread(&chat_id).await;
            }
            ChatEvent::MessageCreated {
                chat_id,
                message_id,
                guild_id,
                author_login,
                author_avatar,
                author_is_bot,
                content,
                attachments,
            } => {
                if author_is_bot {
                    return;
                }
                self.mirror_chat_message(
                    &chat_id,
                    &message_id,
                    guild_id,
                    &author_login,
                    author_avatar.as_deref(),
                    &content,
                    &attachments,
                )
                .await;
            }
            ChatEvent::MessageDeleted {
                chat_id,
                message_id,
            } => {
                self.retract_chat_message(&chat_id, &message_id).await;
            }
            ChatEvent::AssigneeSelected { user_id, assignee } => {
                self.lock_assignments().select(&user_id, &assignee);
                println!("issue bridge recorded assignee selection: user={user_id} assignee={assignee}");
            }
            ChatEvent::AssignmentConfirmed { user_id } => {
                self.confirm_assignment(&user_id).await;
            }
        }
    }

    /// Registers a freshly created forum thread. The tracker issue is only
    /// created once the starter message arrives.
    fn register_thread(&self, chat_id: String, title: String, applied_tags: Vec<String>) {
        if self.store.get(&chat_id).is_some() {
            return;
        }
        let mut thread = MirrorThread::new(chat_id.clone(), title);
        thread.applied_tags = applied_tags;
        self.store.upsert(thread);
        println!("issue bridge registered thread: chat_id={chat_id}");
    }

    async fn apply_thread_update(&self, chat_id: &str, locked: bool, archived: bool) {
        let Some(thread) = self.store.get(chat_id) else {
            return;
        };

        let (next_phase, reaction) =
            react_to_lock_signal(thread.guard, thread.locked, locked, thread.archived);
        self.store.update(chat_id, |entry| entry.guard = next_phase);

        if let LockReaction::Propagate { locked } = reaction {
            match thread.issue_number {
                Some(issue_number) => {
                    let outcome = if locked {
                        self.tracker.lock_issue(issue_number).await
                    } else {
                        self.tracker.unlock_issue(issue_number).await
                    };
                    match outcome {
                        Ok(()) => {
                            self.store.update(chat_id, |entry| entry.locked = locked);
                            println!(
                                "issue bridge propagated lock change: chat_id={chat_id} issue=#{issue_number} locked={locked}"
                            );
                        }
                        Err(error) => {
                            eprintln!(
                                "issue bridge failed to propagate lock change: chat_id={chat_id} issue=#{issue_number}: {error:#}"
                            );
                        }
                    }
                }
                None => {
                    // Record the chat-side state so the thread stays
                    // consistent once its issue exists.
                    self.store.update(chat_id, |entry| entry.locked = locked);
                    eprintln!(
                        "issue bridge cannot propagate lock change: chat_id={chat_id} has no issue number"
                    );
                }
            }
        }

        if archived != thread.archived {
            self.schedule_archive_debounce(chat_id.to_string(), archived);
        }
    }

    /// Deletes the mirrored issue and forgets the thread. The entry is
    /// removed even when the tracker call fails; the chat side is already
    /// gone and the record would otherwise leak forever.
    async fn tear_down_thread(&self, chat_id: &str) {
        let Some(thread) = self.store.get(chat_id) else {
            return;
        };
        self.cancel_archive_debounce(chat_id);
        if let Some(node_id) = &thread.issue_node_id {
            if let Err(error) = self.tracker.delete_issue(node_id).await {
                eprintln!(
                    "issue bridge failed to delete mirrored issue: chat_id={chat_id} node_id={node_id}: {error:#}"
                );
            }
        }
        self.store.remove(chat_id);
        println!("issue bridge removed thread: chat_id={chat_id}");
    }

    #[allow(clippy::too_many_arguments)]
    async fn mirror_chat_message(
        &self,
        chat_id: &str,
        message_id: &str,
        guild_id: u64,
        author_login: &str,
        author_avatar: Option<&str>,
        content: &str,
        attachments: &[ChatAttachment],
    ) {
        let Some(thread) = self.store.get(chat_id) else {
            return;
        };
        let (Ok(channel_id), Ok(numeric_message_id)) =
            (chat_id.parse::<u64>(), message_id.parse::<u64>())
        else {
            eprintln!(
                "issue bridge dropped message with non-numeric ids: chat_id={chat_id} message_id={message_id}"
            );
            return;
        };
        let reference = ChatMessageRef::new(guild_id, channel_id, numeric_message_id);
        let body = render_tracker_body(author_login, author_avatar, &reference, content, attachments);

        if !thread.has_issue() {
            self.open_issue_for_thread(&thread, body).await;
            return;
        }

        if thread.comment_by_chat_message(message_id).is_some() {
            return;
        }
        let Some(issue_number) = thread.issue_number else {
            eprintln!(
                "issue bridge cannot mirror comment: chat_id={chat_id} has no issue number"
            );
            return;
        };
        match self.tracker.create_comment(issue_number, &body).await {
            Ok(tracker_comment_id) => {
                self.store.update(chat_id, |entry| {
                    entry.comments.push(MirrorComment {
                        origin: CommentOrigin::ChatMessage {
                            message_id: message_id.to_string(),
                        },
                        tracker_comment_id,
                    });
                });
                println!(
                    "issue bridge mirrored comment: chat_id={chat_id} issue=#{issue_number} comment={tracker_comment_id}"
                );
            }
            Err(error) => {
                eprintln!(
                    "issue bridge failed to mirror comment: chat_id={chat_id} issue=#{issue_number}: {error:#}"
                );
            }
        }
    }

    /// First message in a thread: open the tracker issue, record the issue
    /// fields, and post the announcement prompting assignment.
    async fn open_issue_for_thread(&self, thread: &MirrorThread, body: String) {
        let labels = self.labels_for_tags(&thread.applied_tags);
        let created = match self.tracker.create_issue(&thread.title, &body, &labels).await {
            Ok(created) => created,
            Err(error) => {
                eprintln!(
                    "issue bridge failed to open issue: chat_id={} title={:?}: {error:#}",
                    thread.chat_id, thread.title
                );
                return;
            }
        };
        self.store.update(&thread.chat_id, |entry| {
            entry.issue_number = Some(created.number);
            entry.issue_node_id = Some(created.node_id.clone());
            entry.body = Some(created.body.clone());
        });
        println!(
            "issue bridge opened issue: chat_id={} issue=#{}",
            thread.chat_id, created.number
        );

        self.lock_assignments().note_created_issue(created.number);

        let announcement = render_issue_announcement(&self.config.repo_slug, created.number);
        if let Err(error) = self.chat.create_message(&thread.chat_id, &announcement).await {
            eprintln!(
                "issue bridge failed to post issue announcement: chat_id={}: {error:#}",
                thread.chat_id
            );
        }
    }

    async fn retract_chat_message(&self, chat_id: &str, message_id: &str) {
        let Some(thread) = self.store.get(chat_id) else {
            return;
        };
        let Some(comment) = thread.comment_by_chat_message(message_id) else {
            return;
        };
        let tracker_comment_id = comment.tracker_comment_id;
        match self.tracker.delete_comment(tracker_comment_id).await {
            Ok(()) => {
                self.store.update(chat_id, |entry| {
                    entry
                        .comments
                        .retain(|c| c.tracker_comment_id != tracker_comment_id);
                });
                println!(
                    "issue bridge retracted comment: chat_id={chat_id} comment={tracker_comment_id}"
                );
            }
            Err(error) => {
                eprintln!(
                    "issue bridge failed to delete mirrored comment: chat_id={chat_id} comment={tracker_comment_id}: {error:#}"
                );
            }
        }
    }

    async fn confirm_assignment(&self, user_id: &str) {
        let Some((issue_number, assignee)) = self.lock_assignments().confirm(user_id) else {
            eprintln!("issue bridge has no pending selection to confirm: user={user_id}");
            return;
        };
        match self.tracker.assign_issue(issue_number, &assignee).await {
            Ok(()) => {
                println!(
                    "issue bridge assigned issue: issue=#{issue_number} assignee={assignee}"
                );
            }
            Err(error) => {
                eprintln!(
                    "issue bridge failed to assign issue: issue=#{issue_number} assignee={assignee}: {error:#}"
                );
            }
        }
    }
}
