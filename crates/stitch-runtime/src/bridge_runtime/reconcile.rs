//! Startup reconciliation: rebuilds the in-memory mirror registry from the
//! tracker's full issue and comment listings.

use anyhow::{Context, Result};

use stitch_core::correlation::extract_chat_reference;
use stitch_core::mirror_store::{CommentOrigin, MirrorComment, MirrorThread};
use stitch_core::platform::{TrackerComment, TrackerIssue};
use stitch_core::render::render_chat_message;

use super::BridgeRuntime;

/// Issue bodies the tracker reports as empty still need content for a
/// mirrored thread's starter message.
const EMPTY_BODY_FALLBACK: &str = "No Info";

impl BridgeRuntime {
    /// Rebuilds the mirror registry from the tracker listings. Issues whose
    /// body embeds a correlation fragment are re-attached to their existing
    /// chat thread; the rest are mirrored as new forum threads. Returns the
    /// number of threads registered by this pass.
    ///
    /// Fails only when a listing cannot be fetched; per-issue chat failures
    /// are logged and skipped so one bad row never aborts the pass.
    pub async fn reconcile(&self) -> Result<usize> {
        let issues = self
            .tracker
            .list_issues()
            .await
            .context("reconcile failed to list issues")?;
        let comments = self
            .tracker
            .list_comments()
            .await
            .context("reconcile failed to list comments")?;
        println!(
            "issue bridge reconciling {} issues and {} comments",
            issues.len(),
            comments.len()
        );

        let mut registered = 0usize;
        for issue in issues {
            if self.reconcile_issue(issue).await {
                registered += 1;
            }
        }
        for comment in comments {
            self.reconcile_comment(comment).await;
        }

        println!(
            "issue bridge reconcile registered {registered} threads, {} tracked",
            self.store.len()
        );
        Ok(registered)
    }

    async fn reconcile_issue(&self, issue: TrackerIssue) -> bool {
        if self.store.find_by_issue_node(&issue.node_id).is_some() {
            return false;
        }
        let body = match issue.body.as_deref() {
            Some(body) if !body.trim().is_empty() => body.to_string(),
            _ => EMPTY_BODY_FALLBACK.to_string(),
        };

        if let Some(reference) = extract_chat_reference(&body) {
            // The issue was created from a chat thread; re-attach it.
            let chat_id = reference.channel_id.to_string();
            let mut thread = MirrorThread::new(chat_id.clone(), issue.title);
            thread.issue_number = Some(issue.number);
            thread.issue_node_id = Some(issue.node_id);
            thread.body = Some(body);
            thread.archived = issue.closed;
            thread.locked = issue.locked;
            self.store.upsert(thread);
            println!(
                "issue bridge re-attached issue: chat_id={chat_id} issue=#{}",
                issue.number
            );
            return true;
        }

        // Tracker-originated issue with no chat counterpart yet.
        let applied_tags = self.tags_for_labels(&issue.labels);
        let rendered = render_chat_message("github", &body);
        match self
            .chat
            .create_thread(&issue.title, &rendered, &applied_tags)
            .await
        {
            Ok(created) => {
                let mut thread = MirrorThread::new(created.chat_id.clone(), issue.title);
                thread.issue_number = Some(issue.number);
                thread.issue_node_id = Some(issue.node_id);
                thread.body = Some(body);
                thread.applied_tags = applied_tags;
                self.store.upsert(thread);
                println!(
                    "issue bridge mirrored issue during reconcile: chat_id={} issue=#{}",
                    created.chat_id, issue.number
                );
                true
            }
            Err(error) => {
                eprintln!(
                    "issue bridge skipped issue #{} during reconcile: {error:#}",
                    issue.number
                );
                false
            }
        }
    }

    async fn reconcile_comment(&self, comment: TrackerComment) {
        let Some(thread) = self.store.find_by_issue_number(comment.issue_number) else {
            return;
        };
        if thread.has_tracker_comment(comment.id) {
            return;
        }
        let Some(body) = comment.body.as_deref().filter(|b| !b.trim().is_empty()) else {
            return;
        };

        if let Some(reference) = extract_chat_reference(body) {
            // Chat-originated comment: restore the message correlation
            // without touching either platform.
            self.store.update(&thread.chat_id, |entry| {
                entry.comments.push(MirrorComment {
                    origin: CommentOrigin::ChatMessage {
                        message_id: reference.message_id.to_string(),
                    },
                    tracker_comment_id: comment.id,
                });
            });
            return;
        }

        // Tracker-originated comment that never reached the chat thread.
        let rendered = render_chat_message(&comment.author_login, body);
        match self.chat.create_message(&thread.chat_id, &rendered).await {
            Ok(_) => {
                self.store.update(&thread.chat_id, |entry| {
                    entry.comments.push(MirrorComment {
                        origin: CommentOrigin::TrackerOriginated,
                        tracker_comment_id: comment.id,
                    });
                });
            }
            Err(error) => {
                eprintln!(
                    "issue bridge skipped comment {} during reconcile: {error:#}",
                    comment.id
                );
            }
        }
    }
}
