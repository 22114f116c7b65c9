//! Semantic cache domain models and traits
//!
//! Provides vector-based caching that matches semantically similar calls
//! rather than requiring exact key matches. Entries are partitioned by
//! [`CacheScope`] and matched by vector distance under a [`CachePolicy`].

mod entry;
mod fingerprint;
mod index;
mod metric;
mod policy;
mod result;
mod scope;

pub use entry::CacheEntry;
pub use fingerprint::{CacheableCall, Fingerprint, LlmCall, NotCacheable, ToolInvocation};
pub use index::{nearest_within, Candidate, IndexMatch, SimilarityIndex};
pub use metric::DistanceMetric;
pub use policy::{CachePolicy, ScopeFlags};
pub use result::{CacheHit, CacheMiss, CacheResult, PendingWrite};
pub use scope::CacheScope;

#[cfg(test)]
pub use index::MockSimilarityIndex;
