use serde::{Deserialize, Serialize};

/// Role of a message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Content part for multimodal messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(flatten)]
    content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text { content: String },
    Parts { content: Vec<ContentPart> },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, content)
    }

    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Parts { content: parts },
        }
    }

    fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text {
                content: content.into(),
            },
        }
    }

    /// First non-empty text carried by the message
    pub fn content_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { content } => Some(content.as_str()).filter(|c| !c.is_empty()),
            MessageContent::Parts { content } => content.iter().find_map(|p| match p {
                ContentPart::Text { text } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content_text(), Some("Hello"));
    }

    #[test]
    fn test_parts_skip_images_and_empty_text() {
        let msg = Message::user_with_parts(vec![
            ContentPart::ImageUrl {
                url: "https://example.com/a.png".into(),
            },
            ContentPart::Text { text: String::new() },
            ContentPart::Text {
                text: "describe this".into(),
            },
        ]);

        assert_eq!(msg.content_text(), Some("describe this"));
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::assistant("Hi there!");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        assert!(json.contains("\"content\":\"Hi there!\""));
    }
}
