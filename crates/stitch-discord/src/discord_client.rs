//! Discord REST client for the chat side of the bridge.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use stitch_core::platform::{ChatPlatform, CreatedChatThread, ForumTag};

#[derive(Debug, Clone, Deserialize)]
struct ChannelIdResponse {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ForumChannelResponse {
    #[serde(default)]
    available_tags: Vec<ForumTag>,
}

fn truncate_for_error(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let truncated: String = body.chars().take(max_chars).collect();
    format!("{truncated}…")
}

#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    forum_channel_id: String,
}

impl DiscordClient {
    pub fn new(
        api_base: String,
        bot_token: String,
        forum_channel_id: String,
        request_timeout_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("stitch-issue-bridge"),
        );
        let auth_header = format!("Bot {}", bot_token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid discord authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create discord api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            forum_channel_id,
        })
    }

    fn channel_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{channel_id}", self.api_base)
    }

    async fn request_json<T>(&self, operation: &str, request: reqwest::RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .with_context(|| format!("discord api {operation} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "discord api {operation} failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 800)
            );
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode discord {operation}"))
    }

    async fn request_unit(&self, operation: &str, request: reqwest::RequestBuilder) -> Result<()> {
        let response = request
            .send()
            .await
            .with_context(|| format!("discord api {operation} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "discord api {operation} failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 800)
            );
        }
        Ok(())
    }

    async fn patch_thread(&self, operation: &str, chat_id: &str, payload: serde_json::Value) -> Result<()> {
        self.request_unit(
            operation,
            self.http.patch(self.channel_url(chat_id)).json(&payload),
        )
        .await
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn create_thread(
        &self,
        title: &str,
        body: &str,
        applied_tags: &[String],
    ) -> Result<CreatedChatThread> {
        let payload = json!({
            "name": title,
            "applied_tags": applied_tags,
            "message": { "content": body },
        });
        let response: ChannelIdResponse = self
            .request_json(
                "create forum thread",
                self.http
                    .post(format!("{}/threads", self.channel_url(&self.forum_channel_id)))
                    .json(&payload),
            )
            .await?;
        Ok(CreatedChatThread {
            chat_id: response.id,
        })
    }

    async fn create_message(&self, chat_id: &str, body: &str) -> Result<String> {
        let payload = json!({ "content": body });
        let response: ChannelIdResponse = self
            .request_json(
                "create message",
                self.http
                    .post(format!("{}/messages", self.channel_url(chat_id)))
                    .json(&payload),
            )
            .await?;
        Ok(response.id)
    }

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()> {
        self.request_unit(
            "delete message",
            self.http
                .delete(format!("{}/messages/{message_id}", self.channel_url(chat_id))),
        )
        .await
    }

    async fn archive_thread(&self, chat_id: &str) -> Result<()> {
        self.patch_thread("archive thread", chat_id, json!({ "archived": true }))
            .await
    }

    async fn unarchive_thread(&self, chat_id: &str) -> Result<()> {
        self.patch_thread("unarchive thread", chat_id, json!({ "archived": false }))
            .await
    }

    async fn lock_thread(&self, chat_id: &str) -> Result<()> {
        self.patch_thread("lock thread", chat_id, json!({ "locked": true }))
            .await
    }

    async fn unlock_thread(&self, chat_id: &str) -> Result<()> {
        self.patch_thread("unlock thread", chat_id, json!({ "locked": false }))
            .await
    }

    async fn delete_thread(&self, chat_id: &str) -> Result<()> {
        self.request_unit("delete thread", self.http.delete(self.channel_url(chat_id)))
            .await
    }

    async fn forum_tags(&self) -> Result<Vec<ForumTag>> {
        let response: ForumChannelResponse = self
            .request_json(
                "fetch forum channel",
                self.http.get(self.channel_url(&self.forum_channel_id)),
            )
            .await?;
        Ok(response.available_tags)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;
    use stitch_core::platform::ChatPlatform;

    use super::DiscordClient;

    fn test_client(base_url: &str) -> DiscordClient {
        DiscordClient::new(
            base_url.to_string(),
            "bot-token".to_string(),
            "FORUM".to_string(),
            3_000,
        )
        .expect("client")
    }

    #[tokio::test]
    async fn functional_create_thread_posts_to_forum_threads_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/channels/FORUM/threads")
                .header("authorization", "Bot bot-token")
                .body_includes("issue title");
            then.status(201).json_body(json!({"id": "thread-1"}));
        });

        let created = test_client(&server.base_url())
            .create_thread("issue title", "issue body", &[])
            .await
            .expect("create thread");
        mock.assert();
        assert_eq!(created.chat_id, "thread-1");
    }

    #[tokio::test]
    async fn functional_lock_thread_patches_channel() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/thread-1")
                .body_includes("locked");
            then.status(200).json_body(json!({"id": "thread-1"}));
        });

        test_client(&server.base_url())
            .lock_thread("thread-1")
            .await
            .expect("lock thread");
        mock.assert();
    }

    #[tokio::test]
    async fn functional_forum_tags_reads_available_tags() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/channels/FORUM");
            then.status(200).json_body(json!({
                "id": "FORUM",
                "available_tags": [
                    {"id": "t1", "name": "bug"},
                    {"id": "t2", "name": "feature"}
                ]
            }));
        });

        let tags = test_client(&server.base_url())
            .forum_tags()
            .await
            .expect("forum tags");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "bug");
    }

    #[tokio::test]
    async fn regression_api_failure_surfaces_status_and_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/channels/thread-1/messages/m1");
            then.status(404).body("Unknown Message");
        });

        let error = test_client(&server.base_url())
            .delete_message("thread-1", "m1")
            .await
            .expect_err("delete should fail");
        let message = format!("{error:#}");
        assert!(message.contains("404"));
        assert!(message.contains("Unknown Message"));
    }
}
