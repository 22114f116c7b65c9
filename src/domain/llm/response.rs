use serde::{Deserialize, Serialize};

use super::Message;
use crate::domain::tool::ToolCall;

/// Reason why the generation finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Response from a model invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub id: String,
    pub model: String,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Tool invocations requested by the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Set on streamed chunks that are not the final aggregate
    #[serde(default)]
    pub partial: bool,
}

impl LlmResponse {
    pub fn new(id: String, model: String, message: Message) -> Self {
        Self {
            id,
            model,
            message,
            finish_reason: None,
            usage: None,
            tool_calls: Vec::new(),
            error_message: None,
            partial: false,
        }
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn content(&self) -> Option<&str> {
        self.message.content_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_calculation() {
        let usage = Usage::new(10, 20);
        assert_eq!(usage.total_tokens, 30);
    }

    #[test]
    fn test_response_json_keeps_structured_fields() {
        let response = LlmResponse::new(
            "id-123".to_string(),
            "gpt-4".to_string(),
            Message::assistant("Hello!"),
        )
        .with_finish_reason(FinishReason::Stop)
        .with_usage(Usage::new(3, 2));

        let json = serde_json::to_value(&response).unwrap();
        let back: LlmResponse = serde_json::from_value(json).unwrap();

        assert_eq!(back, response);
        assert_eq!(back.content(), Some("Hello!"));
    }
}
