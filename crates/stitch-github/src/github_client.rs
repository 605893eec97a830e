//! GitHub REST/GraphQL client for the issue-tracker side of the bridge.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use stitch_core::platform::{CreatedIssue, IssueTracker, TrackerComment, TrackerIssue};

const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid repo slug '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid repo slug '{raw}', expected owner/repo");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GithubLabelRow {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubIssueRow {
    number: u64,
    node_id: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<GithubLabelRow>,
    #[serde(default)]
    locked: bool,
    state: String,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubUserRow {
    login: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubCommentRow {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<GithubUserRow>,
    issue_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubIssueCreateResponse {
    number: u64,
    node_id: String,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubCommentCreateResponse {
    id: u64,
}

/// The repo-wide comment listing reports each comment's parent issue only
/// through its API url; the trailing segment is the issue number.
fn issue_number_from_comment_url(issue_url: &str) -> Option<u64> {
    issue_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()?
        .parse::<u64>()
        .ok()
}

fn truncate_for_error(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let truncated: String = body.chars().take(max_chars).collect();
    format!("{truncated}…")
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
}

impl GithubClient {
    pub fn new(
        api_base: String,
        token: String,
        repo: RepoRef,
        request_timeout_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("stitch-issue-bridge"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.repo.owner, self.repo.name, suffix
        )
    }

    async fn request_json<T>(&self, operation: &str, request: reqwest::RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .with_context(|| format!("github api {operation} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "github api {operation} failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 800)
            );
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode github {operation}"))
    }

    async fn request_unit(&self, operation: &str, request: reqwest::RequestBuilder) -> Result<()> {
        let response = request
            .send()
            .await
            .with_context(|| format!("github api {operation} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "github api {operation} failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 800)
            );
        }
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for GithubClient {
    async fn list_issues(&self) -> Result<Vec<TrackerIssue>> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<GithubIssueRow> = self
                .request_json(
                    "list issues",
                    self.http.get(self.repo_url("issues")).query(&[
                        ("state", "all"),
                        ("per_page", "100"),
                        ("page", page_value.as_str()),
                    ]),
                )
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk.into_iter().filter_map(|issue| {
                if issue.pull_request.is_some() {
                    return None;
                }
                Some(TrackerIssue {
                    number: issue.number,
                    node_id: issue.node_id,
                    title: issue.title,
                    body: issue.body,
                    labels: issue.labels.into_iter().map(|label| label.name).collect(),
                    locked: issue.locked,
                    closed: issue.state == "closed",
                })
            }));
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    async fn list_comments(&self) -> Result<Vec<TrackerComment>> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<GithubCommentRow> = self
                .request_json(
                    "list repo comments",
                    self.http.get(self.repo_url("issues/comments")).query(&[
                        ("per_page", "100"),
                        ("page", page_value.as_str()),
                    ]),
                )
                .await?;
            let chunk_len = chunk.len();
            for comment in chunk {
                let Some(issue_number) = issue_number_from_comment_url(&comment.issue_url) else {
                    continue;
                };
                rows.push(TrackerComment {
                    id: comment.id,
                    issue_number,
                    body: comment.body,
                    author_login: comment.user.map(|user| user.login).unwrap_or_default(),
                });
            }
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<CreatedIssue> {
        let payload = json!({ "title": title, "body": body, "labels": labels });
        let response: GithubIssueCreateResponse = self
            .request_json(
                "create issue",
                self.http.post(self.repo_url("issues")).json(&payload),
            )
            .await?;
        Ok(CreatedIssue {
            number: response.number,
            node_id: response.node_id,
            body: response.body.unwrap_or_else(|| body.to_string()),
        })
    }

    async fn create_comment(&self, issue_number: u64, body: &str) -> Result<u64> {
        let payload = json!({ "body": body });
        let response: GithubCommentCreateResponse = self
            .request_json(
                "create issue comment",
                self.http
                    .post(self.repo_url(&format!("issues/{issue_number}/comments")))
                    .json(&payload),
            )
            .await?;
        Ok(response.id)
    }

    async fn delete_comment(&self, comment_id: u64) -> Result<()> {
        self.request_unit(
            "delete issue comment",
            self.http
                .delete(self.repo_url(&format!("issues/comments/{comment_id}"))),
        )
        .await
    }

    async fn delete_issue(&self, node_id: &str) -> Result<()> {
        // Issue deletion is only exposed through the GraphQL API.
        let payload = json!({
            "query": "mutation($issueId: ID!) { deleteIssue(input: {issueId: $issueId}) { clientMutationId } }",
            "variables": { "issueId": node_id },
        });
        let response: serde_json::Value = self
            .request_json(
                "delete issue",
                self.http
                    .post(format!("{}/graphql", self.api_base))
                    .json(&payload),
            )
            .await?;
        if let Some(errors) = response.get("errors").and_then(|value| value.as_array()) {
            if !errors.is_empty() {
                bail!(
                    "github api delete issue returned errors: {}",
                    truncate_for_error(&errors[0].to_string(), 800)
                );
            }
        }
        Ok(())
    }

    async fn set_issue_state(&self, issue_number: u64, open: bool) -> Result<()> {
        let state = if open { "open" } else { "closed" };
        let payload = json!({ "state": state });
        self.request_unit(
            "update issue state",
            self.http
                .patch(self.repo_url(&format!("issues/{issue_number}")))
                .json(&payload),
        )
        .await
    }

    async fn lock_issue(&self, issue_number: u64) -> Result<()> {
        self.request_unit(
            "lock issue",
            self.http
                .put(self.repo_url(&format!("issues/{issue_number}/lock"))),
        )
        .await
    }

    async fn unlock_issue(&self, issue_number: u64) -> Result<()> {
        self.request_unit(
            "unlock issue",
            self.http
                .delete(self.repo_url(&format!("issues/{issue_number}/lock"))),
        )
        .await
    }

    async fn assign_issue(&self, issue_number: u64, assignee: &str) -> Result<()> {
        let payload = json!({ "assignees": [assignee] });
        self.request_unit(
            "assign issue",
            self.http
                .post(self.repo_url(&format!("issues/{issue_number}/assignees")))
                .json(&payload),
        )
        .await
    }

    async fn list_collaborators(&self) -> Result<Vec<String>> {
        let rows: Vec<GithubUserRow> = self
            .request_json(
                "list collaborators",
                self.http.get(self.repo_url("collaborators")),
            )
            .await?;
        Ok(rows.into_iter().map(|user| user.login).collect())
    }
}
