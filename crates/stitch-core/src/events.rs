//! Canonical event sets the platform adapters normalize into.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Image or file attached to a chat message.
pub struct ChatAttachment {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Chat-platform events after normalization. `parent_id` carries the forum
/// channel a thread belongs to so the runtime can filter to the monitored
/// forum.
pub enum ChatEvent {
    ThreadCreated {
        chat_id: String,
        parent_id: String,
        title: String,
        applied_tags: Vec<String>,
    },
    ThreadUpdated {
        chat_id: String,
        parent_id: String,
        locked: bool,
        archived: bool,
    },
    ThreadDeleted {
        chat_id: String,
        parent_id: String,
    },
    MessageCreated {
        chat_id: String,
        message_id: String,
        guild_id: u64,
        author_login: String,
        author_avatar: Option<String>,
        author_is_bot: bool,
        content: String,
        attachments: Vec<ChatAttachment>,
    },
    MessageDeleted {
        chat_id: String,
        message_id: String,
    },
    AssigneeSelected {
        user_id: String,
        assignee: String,
    },
    AssignmentConfirmed {
        user_id: String,
    },
}

impl ChatEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ThreadCreated { .. } => "thread_created",
            Self::ThreadUpdated { .. } => "thread_updated",
            Self::ThreadDeleted { .. } => "thread_deleted",
            Self::MessageCreated { .. } => "message_created",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::AssigneeSelected { .. } => "assignee_selected",
            Self::AssignmentConfirmed { .. } => "assignment_confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Issue-tracker webhook events after normalization.
pub enum TrackerEvent {
    IssueOpened {
        number: u64,
        node_id: String,
        title: String,
        body: String,
        author_login: String,
        labels: Vec<String>,
    },
    CommentCreated {
        node_id: String,
        comment_id: u64,
        body: String,
        author_login: String,
    },
    IssueClosed { node_id: String },
    IssueReopened { node_id: String },
    IssueLocked { node_id: String },
    IssueUnlocked { node_id: String },
    IssueDeleted { node_id: String },
}

impl TrackerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IssueOpened { .. } => "issue_opened",
            Self::CommentCreated { .. } => "comment_created",
            Self::IssueClosed { .. } => "issue_closed",
            Self::IssueReopened { .. } => "issue_reopened",
            Self::IssueLocked { .. } => "issue_locked",
            Self::IssueUnlocked { .. } => "issue_unlocked",
            Self::IssueDeleted { .. } => "issue_deleted",
        }
    }

    pub fn node_id(&self) -> &str {
        match self {
            Self::IssueOpened { node_id, .. }
            | Self::CommentCreated { node_id, .. }
            | Self::IssueClosed { node_id }
            | Self::IssueReopened { node_id }
            | Self::IssueLocked { node_id }
            | Self::IssueUnlocked { node_id }
            | Self::IssueDeleted { node_id } => node_id,
        }
    }
}
