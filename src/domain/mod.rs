//! Domain layer - Core cache models, traits and call shapes

pub mod clock;
pub mod context;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod semantic_cache;
pub mod tool;

pub use clock::{Clock, SystemClock};
pub use context::CallContext;
pub use embedding::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
pub use error::DomainError;
pub use llm::{ContentPart, FinishReason, LlmRequest, LlmResponse, Message, MessageRole, Usage};
pub use semantic_cache::{
    CacheEntry, CacheHit, CacheMiss, CachePolicy, CacheResult, CacheScope, CacheableCall,
    DistanceMetric, Fingerprint, IndexMatch, LlmCall, NotCacheable, PendingWrite, ScopeFlags,
    SimilarityIndex, ToolInvocation,
};
pub use tool::ToolCall;
