//! Lookup outcomes

use serde_json::Value;

use super::{Fingerprint, NotCacheable};

/// Outcome of a cache lookup
#[derive(Debug, Clone)]
pub enum CacheResult {
    Hit(CacheHit),
    Miss(CacheMiss),
}

impl CacheResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheResult::Hit(_))
    }

    /// Whether a later store for this call would write anything
    pub fn is_cacheable(&self) -> bool {
        match self {
            CacheResult::Hit(_) => true,
            CacheResult::Miss(miss) => miss.is_cacheable(),
        }
    }
}

/// A previously stored payload served in place of the real call
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub payload: Value,
    pub distance: f32,
    pub key: String,
    /// Milliseconds since the Unix epoch
    pub cached_at: u64,
}

/// A lookup that found nothing to serve
///
/// Carries what `store` needs once the real call completes; a miss that
/// is not cacheable carries the reason instead.
#[derive(Debug, Clone)]
pub struct CacheMiss {
    outcome: Result<PendingWrite, NotCacheable>,
}

impl CacheMiss {
    pub fn cacheable(pending: PendingWrite) -> Self {
        Self {
            outcome: Ok(pending),
        }
    }

    pub fn not_cacheable(reason: NotCacheable) -> Self {
        Self {
            outcome: Err(reason),
        }
    }

    pub fn is_cacheable(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn reason(&self) -> Option<NotCacheable> {
        self.outcome.as_ref().err().copied()
    }

    pub fn into_pending(self) -> Option<PendingWrite> {
        self.outcome.ok()
    }
}

/// Fingerprint and vector computed at lookup time, reused by `store`
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub fingerprint: Fingerprint,
    pub vector: Vec<f32>,
}
