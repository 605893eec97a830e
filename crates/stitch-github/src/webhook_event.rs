//! Webhook delivery normalization for tracker-originated events.

use anyhow::{Context, Result};
use serde::Deserialize;

use stitch_core::events::TrackerEvent;

#[derive(Debug, Clone, Deserialize)]
struct WebhookUser {
    login: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookLabel {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookIssue {
    number: u64,
    node_id: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    user: WebhookUser,
    #[serde(default)]
    labels: Vec<WebhookLabel>,
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    user: WebhookUser,
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookPayload {
    action: String,
    issue: WebhookIssue,
    #[serde(default)]
    comment: Option<WebhookComment>,
}

/// Translates a webhook delivery body into a canonical tracker event.
///
/// Returns `Ok(None)` for actions the bridge does not react to; payloads
/// missing the fields an action requires are an error the receiver logs
/// and drops.
pub fn normalize_webhook_payload(raw: &str) -> Result<Option<TrackerEvent>> {
    let payload: WebhookPayload =
        serde_json::from_str(raw).context("malformed webhook payload")?;
    let node_id = payload.issue.node_id.clone();

    if let Some(comment) = payload.comment {
        if payload.action != "created" {
            return Ok(None);
        }
        return Ok(Some(TrackerEvent::CommentCreated {
            node_id,
            comment_id: comment.id,
            body: comment.body.unwrap_or_default(),
            author_login: comment.user.login,
        }));
    }

    let event = match payload.action.as_str() {
        "opened" => TrackerEvent::IssueOpened {
            number: payload.issue.number,
            node_id,
            title: payload.issue.title,
            body: payload.issue.body.unwrap_or_default(),
            author_login: payload.issue.user.login,
            labels: payload
                .issue
                .labels
                .into_iter()
                .map(|label| label.name)
                .collect(),
        },
        "closed" => TrackerEvent::IssueClosed { node_id },
        "reopened" => TrackerEvent::IssueReopened { node_id },
        "locked" => TrackerEvent::IssueLocked { node_id },
        "unlocked" => TrackerEvent::IssueUnlocked { node_id },
        "deleted" => TrackerEvent::IssueDeleted { node_id },
        _ => return Ok(None),
    };
    Ok(Some(event))
}
