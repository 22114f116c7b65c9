//! Similarity index trait and shared match selection

use std::cmp::{Ordering, Reverse};

use async_trait::async_trait;

use super::{CacheEntry, CacheScope, DistanceMetric};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Nearest entry returned by a query
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub entry: CacheEntry,
    pub distance: f32,
}

/// Stores entries and answers scoped nearest-neighbour queries
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Backend name for logs
    fn backend(&self) -> &'static str;

    /// Length every stored and queried vector must have
    fn dimensions(&self) -> usize;

    /// Metric used for both writes and reads
    fn metric(&self) -> DistanceMetric;

    /// Write an entry with its TTL, replacing any entry with the same key
    async fn upsert(&self, entry: CacheEntry) -> Result<(), DomainError>;

    /// Nearest unexpired entry in exactly `scope` within `distance_threshold`
    async fn query(
        &self,
        vector: &[f32],
        scope: &CacheScope,
        distance_threshold: f32,
    ) -> Result<Option<IndexMatch>, DomainError>;

    /// Remove every entry
    async fn clear(&self) -> Result<(), DomainError>;

    /// Approximate number of stored entries
    async fn size(&self) -> Result<usize, DomainError>;

    /// Physically remove expired entries, returning how many went
    async fn purge_expired(&self) -> Result<usize, DomainError>;
}

/// A scored entry considered by [`nearest_within`]
#[derive(Debug, Clone)]
pub struct Candidate {
    pub entry: CacheEntry,
    pub distance: f32,
    /// Store-assigned write order, larger is more recent
    pub sequence: u64,
}

/// Pick the nearest candidate within `threshold` that has not expired at `now_millis`.
///
/// Ties on distance go to the most recent write: later `created_at` first,
/// then higher `sequence`, then key order so the result never depends on
/// iteration order.
pub fn nearest_within(
    candidates: impl IntoIterator<Item = Candidate>,
    threshold: f32,
    now_millis: u64,
) -> Option<IndexMatch> {
    candidates
        .into_iter()
        .filter(|c| !c.entry.is_expired_at(now_millis))
        .filter(|c| c.distance <= threshold)
        .min_by(compare_candidates)
        .map(|c| IndexMatch {
            entry: c.entry,
            distance: c.distance,
        })
}

fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| Reverse(a.entry.created_at()).cmp(&Reverse(b.entry.created_at())))
        .then_with(|| Reverse(a.sequence).cmp(&Reverse(b.sequence)))
        .then_with(|| a.entry.key().cmp(b.entry.key()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::semantic_cache::Fingerprint;

    fn candidate(text: &str, distance: f32, created_at: u64, sequence: u64) -> Candidate {
        let entry = CacheEntry::new(
            Fingerprint::new(text, CacheScope::global(), "llm"),
            vec![1.0],
            serde_json::json!(text),
            created_at,
            60,
        );
        Candidate {
            entry,
            distance,
            sequence,
        }
    }

    #[test]
    fn test_nearest_wins() {
        let picked = nearest_within(
            vec![
                candidate("far", 0.09, 1_000, 1),
                candidate("near", 0.02, 1_000, 2),
            ],
            0.1,
            1_500,
        )
        .unwrap();

        assert_eq!(picked.entry.discriminant(), "near");
        assert!((picked.distance - 0.02).abs() < f32::EPSILON);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(nearest_within(vec![candidate("a", 0.1, 1_000, 1)], 0.1, 1_500).is_some());
        assert!(nearest_within(vec![candidate("a", 0.11, 1_000, 1)], 0.1, 1_500).is_none());
    }

    #[test]
    fn test_exact_tie_goes_to_most_recent_write() {
        let picked = nearest_within(
            vec![
                candidate("newer", 0.05, 2_000, 1),
                candidate("older", 0.05, 1_000, 2),
            ],
            0.1,
            2_500,
        )
        .unwrap();
        assert_eq!(picked.entry.discriminant(), "newer");

        let picked = nearest_within(
            vec![
                candidate("first", 0.05, 1_000, 1),
                candidate("second", 0.05, 1_000, 2),
            ],
            0.1,
            2_500,
        )
        .unwrap();
        assert_eq!(picked.entry.discriminant(), "second");
    }

    #[test]
    fn test_expired_candidates_are_skipped() {
        let picked = nearest_within(
            vec![
                candidate("expired", 0.0, 1_000, 1),
                candidate("live", 0.05, 50_000, 2),
            ],
            0.1,
            61_000,
        )
        .unwrap();

        assert_eq!(picked.entry.discriminant(), "live");
    }
}
