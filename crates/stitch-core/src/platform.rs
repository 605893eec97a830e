//! Capability traits the engine calls through, abstracted from the
//! concrete Discord/GitHub SDKs.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Forum tag exposed by the chat platform; tag ids map to tracker labels.
pub struct ForumTag {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CreatedChatThread {
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Issue row returned by the tracker's list endpoint.
pub struct TrackerIssue {
    pub number: u64,
    pub node_id: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub locked: bool,
    /// `true` when the issue state is `closed`.
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Comment row returned by the tracker's bulk comment listing.
pub struct TrackerComment {
    pub id: u64,
    pub issue_number: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author_login: String,
}

#[derive(Debug, Clone)]
/// Fields recorded on the mirror once issue creation succeeds.
pub struct CreatedIssue {
    pub number: u64,
    pub node_id: String,
    pub body: String,
}

#[async_trait]
/// Chat-platform capabilities the engine consumes.
pub trait ChatPlatform: Send + Sync {
    async fn create_thread(
        &self,
        title: &str,
        body: &str,
        applied_tags: &[String],
    ) -> Result<CreatedChatThread>;
    async fn create_message(&self, chat_id: &str, body: &str) -> Result<String>;
    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()>;
    async fn archive_thread(&self, chat_id: &str) -> Result<()>;
    async fn unarchive_thread(&self, chat_id: &str) -> Result<()>;
    async fn lock_thread(&self, chat_id: &str) -> Result<()>;
    async fn unlock_thread(&self, chat_id: &str) -> Result<()>;
    async fn delete_thread(&self, chat_id: &str) -> Result<()>;
    async fn forum_tags(&self) -> Result<Vec<ForumTag>>;
}

#[async_trait]
/// Issue-tracker capabilities the engine consumes.
pub trait IssueTracker: Send + Sync {
    /// All issues, open and closed.
    async fn list_issues(&self) -> Result<Vec<TrackerIssue>>;
    /// All issue comments for the repository, in one bulk listing.
    async fn list_comments(&self) -> Result<Vec<TrackerComment>>;
    async fn create_issue(&self, title: &str, body: &str, labels: &[String])
        -> Result<CreatedIssue>;
    async fn create_comment(&self, issue_number: u64, body: &str) -> Result<u64>;
    async fn delete_comment(&self, comment_id: u64) -> Result<()>;
    async fn delete_issue(&self, node_id: &str) -> Result<()>;
    /// `open == false` closes the issue.
    async fn set_issue_state(&self, issue_number: u64, open: bool) -> Result<()>;
    async fn lock_issue(&self, issue_number: u64) -> Result<()>;
    async fn unlock_issue(&self, issue_number: u64) -> Result<()>;
    async fn assign_issue(&self, issue_number: u64, assignee: &str) -> Result<()>;
    async fn list_collaborators(&self) -> Result<Vec<String>>;
}
