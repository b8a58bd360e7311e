use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::markdown::render_markdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message as stored in the backend's conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: String,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// Text shown in place of an assistant reply whose stream failed
pub const REPLY_ERROR_NOTICE: &str = "Error: Failed to get response";

/// A message in the local chat view
///
/// `content` is what gets displayed: rendered HTML for assistant replies and the
/// raw text for user turns. `source` keeps the text `content` was produced from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub source: String,
    pub created_at: String,
}

impl ChatMessage {
    /// Create a user message with a fresh id and the current timestamp
    pub fn user<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        ChatMessage {
            id: local_id(),
            role: Role::User,
            content: text.clone(),
            source: text,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Create an empty assistant message to be filled in while a reply streams
    pub fn assistant_placeholder() -> Self {
        ChatMessage {
            id: local_id(),
            role: Role::Assistant,
            content: String::new(),
            source: String::new(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Replace the displayed content, keeping the text it was rendered from
    pub fn set_content<S: Into<String>, T: Into<String>>(&mut self, content: S, source: T) {
        self.content = content.into();
        self.source = source.into();
    }
}

impl From<Message> for ChatMessage {
    fn from(message: Message) -> Self {
        let content = match message.role {
            Role::Assistant => render_markdown(&message.content),
            Role::User => message.content.clone(),
        };
        ChatMessage {
            id: format!("msg_{}", message.id),
            role: message.role,
            content,
            source: message.content,
            created_at: message.created_at,
        }
    }
}

fn local_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_message_accepts_numeric_id() {
        let message: Message = serde_json::from_value(json!({
            "id": 42,
            "role": "assistant",
            "content": "**hi**",
            "created_at": "2024-05-01T10:00:00"
        }))
        .unwrap();
        assert_eq!(message.id, "42");
        assert_eq!(message.role, Role::Assistant);
    }

    #[test]
    fn test_history_message_accepts_string_id() {
        let message: Message = serde_json::from_value(json!({
            "id": "abc",
            "role": "user",
            "content": "hello",
            "created_at": "2024-05-01T10:00:00"
        }))
        .unwrap();
        assert_eq!(message.id, "abc");
        assert_eq!(message.role, Role::User);
    }

    #[test]
    fn test_chat_message_from_history_renders_assistant_markdown() {
        let message = Message {
            id: "7".to_string(),
            role: Role::Assistant,
            content: "**hi**".to_string(),
            created_at: "2024-05-01T10:00:00".to_string(),
        };
        let chat: ChatMessage = message.into();
        assert_eq!(chat.id, "msg_7");
        assert_eq!(chat.content, "<p><strong>hi</strong></p>\n");
        assert_eq!(chat.source, "**hi**");
    }

    #[test]
    fn test_chat_message_from_history_keeps_user_text() {
        let message = Message {
            id: "8".to_string(),
            role: Role::User,
            content: "*not rendered*".to_string(),
            created_at: "2024-05-01T10:00:00".to_string(),
        };
        let chat: ChatMessage = message.into();
        assert_eq!(chat.content, "*not rendered*");
    }

    #[test]
    fn test_placeholder_is_filled_in_place() {
        let mut placeholder = ChatMessage::assistant_placeholder();
        assert_eq!(placeholder.role, Role::Assistant);
        assert!(placeholder.content.is_empty());
        placeholder.set_content("<p>A</p>\n", "A");
        assert_eq!(placeholder.content, "<p>A</p>\n");
        assert_eq!(placeholder.source, "A");
    }

    #[test]
    fn test_local_ids_are_unique() {
        let first = ChatMessage::user("a");
        let second = ChatMessage::user("a");
        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("msg_"));
    }
}
