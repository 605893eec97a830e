//! In-memory registry of mirrored threads and their comment correlations.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

use crate::transition_guard::GuardPhase;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Identifies where a mirrored comment originated.
pub enum CommentOrigin {
    /// A live chat message observed through the gateway.
    ChatMessage { message_id: String },
    /// A tracker comment mirrored into chat during reconciliation or via
    /// webhook; no chat-side message id is tracked for these.
    TrackerOriginated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Correlation record between one chat message and one tracker comment.
pub struct MirrorComment {
    pub origin: CommentOrigin,
    pub tracker_comment_id: u64,
}

impl MirrorComment {
    pub fn chat_message_id(&self) -> Option<&str> {
        match &self.origin {
            CommentOrigin::ChatMessage { message_id } => Some(message_id.as_str()),
            CommentOrigin::TrackerOriginated => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One mirrored thread/issue pair. `body` is present once the tracker-side
/// issue exists; its absence marks the thread as issue-less.
pub struct MirrorThread {
    pub chat_id: String,
    #[serde(default)]
    pub issue_number: Option<u64>,
    #[serde(default)]
    pub issue_node_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub applied_tags: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub guard: GuardPhase,
    #[serde(default)]
    pub comments: Vec<MirrorComment>,
}

impl MirrorThread {
    /// A fresh chat-side thread with no tracker-side issue yet.
    pub fn new(chat_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            issue_number: None,
            issue_node_id: None,
            title: title.into(),
            body: None,
            applied_tags: Vec::new(),
            archived: false,
            locked: false,
            guard: GuardPhase::Settled,
            comments: Vec::new(),
        }
    }

    pub fn has_issue(&self) -> bool {
        self.body.is_some()
    }

    pub fn comment_by_chat_message(&self, message_id: &str) -> Option<&MirrorComment> {
        self.comments
            .iter()
            .find(|comment| comment.chat_message_id() == Some(message_id))
    }

    pub fn has_tracker_comment(&self, tracker_comment_id: u64) -> bool {
        self.comments
            .iter()
            .any(|comment| comment.tracker_comment_id == tracker_comment_id)
    }
}

#[derive(Default)]
struct MirrorStoreInner {
    threads: HashMap<String, MirrorThread>,
    by_node_id: HashMap<String, String>,
    by_number: HashMap<u64, String>,
}

impl MirrorStoreInner {
    fn reindex(&mut self, thread: &MirrorThread) {
        if let Some(node_id) = &thread.issue_node_id {
            self.by_node_id
                .insert(node_id.clone(), thread.chat_id.clone());
        }
        if let Some(number) = thread.issue_number {
            self.by_number.insert(number, thread.chat_id.clone());
        }
    }

    fn drop_index(&mut self, thread: &MirrorThread) {
        if let Some(node_id) = &thread.issue_node_id {
            self.by_node_id.remove(node_id);
        }
        if let Some(number) = thread.issue_number {
            self.by_number.remove(&number);
        }
    }
}

/// Cloneable handle to the process-wide mirror registry. The store performs
/// no I/O; lookups clone records out so callers never hold the lock across
/// an await point.
#[derive(Clone, Default)]
pub struct MirrorStore {
    inner: Arc<Mutex<MirrorStoreInner>>,
}

impl MirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MirrorStoreInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, chat_id: &str) -> Option<MirrorThread> {
        self.lock().threads.get(chat_id).cloned()
    }

    pub fn find_by_issue_node(&self, node_id: &str) -> Option<MirrorThread> {
        let inner = self.lock();
        let chat_id = inner.by_node_id.get(node_id)?;
        inner.threads.get(chat_id).cloned()
    }

    pub fn find_by_issue_number(&self, number: u64) -> Option<MirrorThread> {
        let inner = self.lock();
        let chat_id = inner.by_number.get(&number)?;
        inner.threads.get(chat_id).cloned()
    }

    /// Inserts or replaces the thread keyed by its chat id and refreshes the
    /// issue indexes.
    pub fn upsert(&self, thread: MirrorThread) {
        let mut inner = self.lock();
        if let Some(previous) = inner.threads.get(&thread.chat_id).cloned() {
            inner.drop_index(&previous);
        }
        inner.reindex(&thread);
        inner.threads.insert(thread.chat_id.clone(), thread);
    }

    pub fn remove(&self, chat_id: &str) -> Option<MirrorThread> {
        let mut inner = self.lock();
        let removed = inner.threads.remove(chat_id)?;
        inner.drop_index(&removed);
        Some(removed)
    }

    /// Applies `mutate` to the thread under the lock and refreshes indexes.
    /// Returns `None` when no thread exists for `chat_id`.
    pub fn update<R>(
        &self,
        chat_id: &str,
        mutate: impl FnOnce(&mut MirrorThread) -> R,
    ) -> Option<R> {
        let mut inner = self.lock();
        let mut thread = inner.threads.get(chat_id).cloned()?;
        inner.drop_index(&thread);
        let result = mutate(&mut thread);
        inner.reindex(&thread);
        inner.threads.insert(chat_id.to_string(), thread);
        Some(result)
    }

    /// Snapshot of every thread, safe to iterate while other handlers keep
    /// mutating the store.
    pub fn all(&self) -> Vec<MirrorThread> {
        self.lock().threads.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().threads.is_empty()
    }
}
