//! Embedding provider implementations

mod local;
mod openai;

pub use local::LocalEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;

// Re-export HTTP client for use by embedding providers
pub use super::http_client::{HttpClient, HttpClientTrait};
