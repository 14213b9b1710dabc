pub mod telegram;

use chrono::{DateTime, Utc};

use crate::watch::bare_channel_id;

/// Kind of chat a message was posted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// Broadcast channels and supergroups (marked `-100…` ids)
    Channel,
    /// Legacy basic groups
    Group,
    /// One-to-one chats with users or bots
    Private,
}

/// A message received from the source platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Marked chat id
    pub chat_id: i64,
    pub kind: ChatKind,
    /// Public username of the chat, without the leading `@`
    pub handle: Option<String>,
    /// Display title (channel/group title, or the user's name)
    pub title: String,
    /// The message text, possibly empty
    pub text: String,
    pub message_id: Option<i32>,
    pub date: DateTime<Utc>,
    /// Whether the message carries a photo, downloaded or not
    pub has_photo: bool,
    /// Photo bytes, filled in only for messages that are forwarded
    pub photo: Option<Vec<u8>>,
}

impl IncomingMessage {
    /// Human-readable name of the source chat.
    pub fn source_name(&self) -> String {
        if !self.title.is_empty() {
            return self.title.clone();
        }
        match &self.handle {
            Some(handle) => format!("@{}", handle),
            None => format!("Chat {}", self.chat_id),
        }
    }

    /// Link to the message on t.me, if one can be built.
    ///
    /// Public chats link through their handle; channels and supergroups
    /// without one use the `t.me/c/` form, which only members can open.
    /// Private chats and basic groups have no message links.
    pub fn permalink(&self) -> Option<String> {
        let message_id = self.message_id?;
        match (self.kind, self.handle.as_deref()) {
            (ChatKind::Private, _) => None,
            (_, Some(handle)) => Some(format!("https://t.me/{}/{}", handle, message_id)),
            (ChatKind::Channel, None) => {
                let bare = bare_channel_id(self.chat_id)?;
                Some(format!("https://t.me/c/{}/{}", bare, message_id))
            }
            (ChatKind::Group, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(kind: ChatKind, handle: Option<&str>, chat_id: i64) -> IncomingMessage {
        IncomingMessage {
            chat_id,
            kind,
            handle: handle.map(str::to_string),
            title: "News".to_string(),
            text: String::new(),
            message_id: Some(42),
            date: Utc::now(),
            has_photo: false,
            photo: None,
        }
    }

    #[test]
    fn test_public_channel_permalink() {
        let msg = message(ChatKind::Channel, Some("news"), -1001234567890);
        assert_eq!(msg.permalink().as_deref(), Some("https://t.me/news/42"));
    }

    #[test]
    fn test_private_channel_permalink() {
        let msg = message(ChatKind::Channel, None, -1001234567890);
        assert_eq!(
            msg.permalink().as_deref(),
            Some("https://t.me/c/1234567890/42")
        );
    }

    #[test]
    fn test_public_group_permalink() {
        let msg = message(ChatKind::Group, Some("chatters"), -555);
        assert_eq!(msg.permalink().as_deref(), Some("https://t.me/chatters/42"));
    }

    #[test]
    fn test_no_permalink_for_private_chats_and_basic_groups() {
        assert_eq!(message(ChatKind::Private, Some("alice"), 123).permalink(), None);
        assert_eq!(message(ChatKind::Group, None, -555).permalink(), None);
    }

    #[test]
    fn test_no_permalink_without_message_id() {
        let mut msg = message(ChatKind::Channel, Some("news"), -1001234567890);
        msg.message_id = None;
        assert_eq!(msg.permalink(), None);
    }

    #[test]
    fn test_source_name_fallbacks() {
        let mut msg = message(ChatKind::Channel, Some("news"), -1001234567890);
        assert_eq!(msg.source_name(), "News");
        msg.title.clear();
        assert_eq!(msg.source_name(), "@news");
        msg.handle = None;
        assert_eq!(msg.source_name(), "Chat -1001234567890");
    }
}
