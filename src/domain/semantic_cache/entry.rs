//! Stored cache entry

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CacheScope, Fingerprint};

/// The unit of storage in a similarity index
///
/// Entries are never mutated; writing the same key again replaces the
/// entry as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    key: String,
    vector: Vec<f32>,
    discriminant: String,
    payload: Value,
    scope: CacheScope,
    /// Milliseconds since the Unix epoch
    created_at: u64,
    ttl_seconds: u64,
}

impl CacheEntry {
    pub fn new(
        fingerprint: Fingerprint,
        vector: Vec<f32>,
        payload: Value,
        created_at: u64,
        ttl_seconds: u64,
    ) -> Self {
        let Fingerprint {
            key,
            discriminant,
            scope,
        } = fingerprint;

        Self {
            key,
            vector,
            discriminant,
            payload,
            scope,
            created_at,
            ttl_seconds,
        }
    }

    /// Reassemble an entry read back from a store
    pub fn from_parts(
        key: String,
        vector: Vec<f32>,
        discriminant: String,
        payload: Value,
        scope: CacheScope,
        created_at: u64,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            key,
            vector,
            discriminant,
            payload,
            scope,
            created_at,
            ttl_seconds,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn discriminant(&self) -> &str {
        &self.discriminant
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn scope(&self) -> &CacheScope {
        &self.scope
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Milliseconds since the Unix epoch at which the entry stops being served
    pub fn expires_at(&self) -> u64 {
        self.created_at
            .saturating_add(self.ttl_seconds.saturating_mul(1000))
    }

    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        now_millis >= self.expires_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(created_at: u64, ttl_seconds: u64) -> CacheEntry {
        let fingerprint = Fingerprint::new("What is Rust?", CacheScope::global(), "llm");
        CacheEntry::new(
            fingerprint,
            vec![0.1, 0.2],
            serde_json::json!({"text": "A language"}),
            created_at,
            ttl_seconds,
        )
    }

    #[test]
    fn test_entry_takes_fingerprint_fields() {
        let entry = entry(1_000, 60);

        assert_eq!(entry.discriminant(), "What is Rust?");
        assert_eq!(entry.scope(), &CacheScope::global());
        assert_eq!(entry.key().len(), 64);
        assert_eq!(entry.payload()["text"], "A language");
    }

    #[test]
    fn test_expiry_boundary() {
        let entry = entry(1_000, 60);

        assert_eq!(entry.expires_at(), 61_000);
        assert!(!entry.is_expired_at(60_999));
        assert!(entry.is_expired_at(61_000));
    }
}
