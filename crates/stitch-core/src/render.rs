//! Markdown rendering for mirrored bodies.
//!
//! Tracker-side bodies open with an author badge whose avatar image links
//! to the chat permalink; that link is the correlation fragment the
//! extractor recognizes.

use crate::correlation::{chat_permalink, ChatMessageRef};
use crate::events::ChatAttachment;

/// Renders the attachments a chat message carried as markdown images.
/// Only image attachments are mirrored.
pub fn attachments_to_markdown(attachments: &[ChatAttachment]) -> String {
    let mut markdown = String::new();
    for attachment in attachments {
        match attachment.content_type.as_deref() {
            Some("image/png") | Some("image/jpeg") => {
                markdown.push_str(&format!(
                    "![{}]({} \"{}\")",
                    attachment.name, attachment.url, attachment.name
                ));
            }
            _ => {}
        }
    }
    markdown
}

/// Renders a chat message as a tracker issue/comment body. The embedded
/// permalink doubles as the correlation fragment.
pub fn render_tracker_body(
    author_login: &str,
    author_avatar: Option<&str>,
    reference: &ChatMessageRef,
    content: &str,
    attachments: &[ChatAttachment],
) -> String {
    let permalink = chat_permalink(reference);
    let badge = match author_avatar {
        Some(avatar) => format!(
            "<kbd>[![{author_login}]({avatar})]({permalink})</kbd> [{author_login}]({permalink})  `BOT`"
        ),
        None => format!("[{author_login}]({permalink})  `BOT`"),
    };
    format!(
        "{badge}\n\n{content}\n{}\n",
        attachments_to_markdown(attachments)
    )
}

/// Renders a tracker comment for posting into the mirror thread.
pub fn render_chat_message(author_login: &str, body: &str) -> String {
    format!("**{author_login}**\n{body}")
}

/// Announcement posted into a thread once its issue exists, prompting the
/// assignment flow.
pub fn render_issue_announcement(repo_slug: &str, issue_number: u64) -> String {
    format!(
        "Issue #{issue_number} has been created: https://github.com/{repo_slug}/issues/{issue_number}\nPlease assign a developer."
    )
}
