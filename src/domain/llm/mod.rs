//! LLM call domain models
//!
//! Only the parts of a model call the response cache needs to read.

mod message;
mod request;
mod response;

pub use message::{ContentPart, Message, MessageRole};
pub use request::{LlmRequest, LlmRequestBuilder};
pub use response::{FinishReason, LlmResponse, Usage};
