//! Gateway dispatch-frame normalization into canonical chat events.

use anyhow::{anyhow, Result};
use serde_json::Value;

use stitch_core::events::{ChatAttachment, ChatEvent};

const SELECT_ASSIGNEE_COMPONENT: &str = "select_developer";
const CONFIRM_ASSIGNMENT_COMPONENT: &str = "confirm_developer_assignment";

fn string_field(data: &Value, field: &str) -> Result<String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| anyhow!("dispatch payload missing '{field}'"))
}

fn optional_string_field(data: &Value, field: &str) -> Option<String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn string_list_field(data: &Value, field: &str) -> Vec<String> {
    data.get(field)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn avatar_url(author: &Value) -> Option<String> {
    let user_id = author.get("id").and_then(Value::as_str)?;
    let avatar = author.get("avatar").and_then(Value::as_str)?;
    Some(format!(
        "https://cdn.discordapp.com/avatars/{user_id}/{avatar}.webp?size=40"
    ))
}

fn attachments(data: &Value) -> Vec<ChatAttachment> {
    data.get("attachments")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    Some(ChatAttachment {
                        url: row.get("url")?.as_str()?.to_string(),
                        name: row
                            .get("filename")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        content_type: row
                            .get("content_type")
                            .and_then(Value::as_str)
                            .map(ToOwned::to_owned),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn interaction_event(data: &Value) -> Result<Option<ChatEvent>> {
    let component = data
        .get("data")
        .and_then(|inner| inner.get("custom_id"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let user_id = data
        .get("member")
        .and_then(|member| member.get("user"))
        .or_else(|| data.get("user"))
        .and_then(|user| user.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("interaction payload missing user id"))?
        .to_string();

    match component {
        SELECT_ASSIGNEE_COMPONENT => {
            let assignee = data
                .get("data")
                .and_then(|inner| inner.get("values"))
                .and_then(Value::as_array)
                .and_then(|values| values.first())
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("assignee selection carries no value"))?
                .to_string();
            Ok(Some(ChatEvent::AssigneeSelected { user_id, assignee }))
        }
        CONFIRM_ASSIGNMENT_COMPONENT => Ok(Some(ChatEvent::AssignmentConfirmed { user_id })),
        _ => Ok(None),
    }
}

/// Translates one gateway dispatch frame (`t` + `d`) into a canonical chat
/// event. Frames the bridge does not react to yield `Ok(None)`; frames of a
/// known type with missing fields are an error the listener logs and drops.
pub fn normalize_dispatch(event_type: &str, data: &Value) -> Result<Option<ChatEvent>> {
    match event_type {
        "THREAD_CREATE" => Ok(Some(ChatEvent::ThreadCreated {
            chat_id: string_field(data, "id")?,
            parent_id: string_field(data, "parent_id")?,
            title: string_field(data, "name")?,
            applied_tags: string_list_field(data, "applied_tags"),
        })),
        "THREAD_UPDATE" => {
            let metadata = data
                .get("thread_metadata")
                .ok_or_else(|| anyhow!("thread update missing thread_metadata"))?;
            Ok(Some(ChatEvent::ThreadUpdated {
                chat_id: string_field(data, "id")?,
                parent_id: string_field(data, "parent_id")?,
                locked: metadata
                    .get("locked")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                archived: metadata
                    .get("archived")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }))
        }
        "THREAD_DELETE" => Ok(Some(ChatEvent::ThreadDeleted {
            chat_id: string_field(data, "id")?,
            parent_id: string_field(data, "parent_id")?,
        })),
        "MESSAGE_CREATE" => {
            let author = data
                .get("author")
                .ok_or_else(|| anyhow!("message missing author"))?;
            Ok(Some(ChatEvent::MessageCreated {
                chat_id: string_field(data, "channel_id")?,
                message_id: string_field(data, "id")?,
                guild_id: optional_string_field(data, "guild_id")
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or_default(),
                author_login: author
                    .get("username")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                author_avatar: avatar_url(author),
                author_is_bot: author.get("bot").and_then(Value::as_bool).unwrap_or(false),
                content: optional_string_field(data, "content").unwrap_or_default(),
                attachments: attachments(data),
            }))
        }
        "MESSAGE_DELETE" => Ok(Some(ChatEvent::MessageDeleted {
            chat_id: string_field(data, "channel_id")?,
            message_id: string_field(data, "id")?,
        })),
        "INTERACTION_CREATE" => interaction_event(data),
        _ => Ok(None),
    }
}
