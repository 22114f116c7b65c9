use serde::{Deserialize, Serialize};

use super::{Message, MessageRole};

/// A model invocation as seen by the before-model hook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    /// System instruction supplied outside the message list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
}

impl LlmRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            system_instruction: None,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn builder() -> LlmRequestBuilder {
        LlmRequestBuilder::new()
    }

    /// Text of the most recent user message
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == MessageRole::User)
            .find_map(|m| m.content_text())
    }

    /// The explicit system instruction followed by any system messages
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .system_instruction
            .as_deref()
            .filter(|s| !s.is_empty())
            .into_iter()
            .chain(
                self.messages
                    .iter()
                    .filter(|m| m.role == MessageRole::System)
                    .filter_map(|m| m.content_text()),
            )
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// Builder for LlmRequest
#[derive(Debug, Default)]
pub struct LlmRequestBuilder {
    messages: Vec<Message>,
    system_instruction: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    stream: bool,
}

impl LlmRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn system(self, content: impl Into<String>) -> Self {
        self.message(Message::system(content))
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.message(Message::user(content))
    }

    pub fn assistant(self, content: impl Into<String>) -> Self {
        self.message(Message::assistant(content))
    }

    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn build(self) -> LlmRequest {
        LlmRequest {
            messages: self.messages,
            system_instruction: self.system_instruction,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: self.stream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::builder()
            .system("You are a helpful assistant")
            .user("Hello!")
            .temperature(0.7)
            .max_tokens(100)
            .build();

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(100));
        assert!(!request.stream);
    }

    #[test]
    fn test_last_user_text_picks_latest_turn() {
        let request = LlmRequest::builder()
            .user("first question")
            .assistant("first answer")
            .user("second question")
            .build();

        assert_eq!(request.last_user_text(), Some("second question"));
    }

    #[test]
    fn test_last_user_text_missing() {
        let request = LlmRequest::builder().system("System only").build();
        assert_eq!(request.last_user_text(), None);
    }

    #[test]
    fn test_system_text_combines_sources() {
        let request = LlmRequest::builder()
            .system_instruction("Be brief.")
            .system("Answer in French.")
            .user("Hi")
            .build();

        assert_eq!(
            request.system_text().as_deref(),
            Some("Be brief.\nAnswer in French.")
        );
        assert_eq!(LlmRequest::builder().user("Hi").build().system_text(), None);
    }
}
