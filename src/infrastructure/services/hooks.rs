//! Two-phase call interception shared by the response and result caches

use crate::domain::semantic_cache::CacheMiss;

/// Decision returned by a before-hook
#[derive(Debug)]
pub enum BeforeCall<T> {
    /// Serve this cached result and skip the real call
    ShortCircuit(T),
    /// Run the real call, then hand its result and this token to the after-hook
    Proceed(CallToken),
}

impl<T> BeforeCall<T> {
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, BeforeCall::ShortCircuit(_))
    }
}

/// Carries lookup state from the before-hook to the after-hook
///
/// Holds the fingerprint and vector computed during lookup, so the
/// after-hook never embeds again. Dropping the token (for example when
/// the real call fails or is cancelled) writes nothing.
#[derive(Debug)]
pub struct CallToken {
    pub(crate) miss: CacheMiss,
}

impl CallToken {
    pub(crate) fn new(miss: CacheMiss) -> Self {
        Self { miss }
    }

    /// Whether the after-hook will write anything for this call
    pub fn is_cacheable(&self) -> bool {
        self.miss.is_cacheable()
    }
}
