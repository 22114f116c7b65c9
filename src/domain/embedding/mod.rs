//! Embedding provider domain models and traits
//!
//! The vectorizer seam of the cache: anything that can turn discriminant
//! text into a fixed-length vector.

mod provider;
mod request;
mod response;

pub use provider::EmbeddingProvider;
pub use request::{EmbeddingInput, EmbeddingRequest};
pub use response::{Embedding, EmbeddingResponse, EmbeddingUsage};

#[cfg(test)]
pub use provider::mock::MockEmbeddingProvider;
