//! Similarity index implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{IndexConfig, IndexType, SimilarityIndexFactory};
pub use in_memory::{InMemoryIndexConfig, InMemorySimilarityIndex};
pub use self::redis::{RedisIndexConfig, RedisSimilarityIndex};
