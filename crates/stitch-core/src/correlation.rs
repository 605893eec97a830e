//! Cross-platform identity correlation via embedded chat permalinks.
//!
//! A rendered issue or comment body carries a markdown link whose target is
//! the Discord message permalink. Either side can recognize an
//! already-mirrored entity by extracting that link; there is no persistent
//! join table.

use std::sync::OnceLock;

use regex::Regex;

// The trailing `)` anchors the match to a markdown link target so that a
// bare permalink pasted into prose is not treated as a correlation fragment.
const CHAT_REFERENCE_PATTERN: &str = r"https://discord\.com/channels/(\d+)/(\d+)/(\d+)\)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The three identifiers a correlation fragment embeds. For a forum
/// thread's starter message, `channel_id` is the thread id.
pub struct ChatMessageRef {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

impl ChatMessageRef {
    pub fn new(guild_id: u64, channel_id: u64, message_id: u64) -> Self {
        Self {
            guild_id,
            channel_id,
            message_id,
        }
    }
}

fn chat_reference_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(CHAT_REFERENCE_PATTERN).unwrap_or_else(|_| {
            // The pattern is a compile-time literal; this branch is dead.
            unreachable!("chat reference pattern failed to compile")
        })
    })
}

/// The permalink embedded in rendered bodies. Callers wrap it in a
/// markdown link, which supplies the trailing `)` the extractor requires.
pub fn chat_permalink(reference: &ChatMessageRef) -> String {
    format!(
        "https://discord.com/channels/{}/{}/{}",
        reference.guild_id, reference.channel_id, reference.message_id
    )
}

/// Scans `text` for a correlation fragment. Returns the first embedded
/// reference, or `None` when the body carries no recognizable fragment.
pub fn extract_chat_reference(text: &str) -> Option<ChatMessageRef> {
    let captures = chat_reference_regex().captures(text)?;
    let guild_id = captures.get(1)?.as_str().parse::<u64>().ok()?;
    let channel_id = captures.get(2)?.as_str().parse::<u64>().ok()?;
    let message_id = captures.get(3)?.as_str().parse::<u64>().ok()?;
    Some(ChatMessageRef {
        guild_id,
        channel_id,
        message_id,
    })
}
