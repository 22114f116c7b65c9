//! Vector distance metrics

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Distance metric used by a similarity index
///
/// Smaller is closer for every variant. Identical vectors are always at
/// distance exactly `0.0`, so a threshold of zero means exact match only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`
    #[default]
    Cosine,
    /// Euclidean distance
    L2,
    /// `1 - dot(a, b)`, meant for normalized vectors
    #[serde(rename = "ip")]
    InnerProduct,
}

impl DistanceMetric {
    /// Distance between two vectors, `None` if they are not comparable
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Option<f32> {
        if a.len() != b.len() || a.is_empty() {
            return None;
        }

        if a == b {
            return Some(0.0);
        }

        let distance = match self {
            DistanceMetric::Cosine => (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0),
            DistanceMetric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = f64::from(*x) - f64::from(*y);
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::InnerProduct => 1.0 - dot(a, b),
        };

        // Only identical vectors may sit at zero
        Some((distance as f32).max(f32::MIN_POSITIVE))
    }

    /// Largest meaningful threshold, if the metric is bounded
    pub fn max_distance(&self) -> Option<f32> {
        match self {
            DistanceMetric::Cosine => Some(2.0),
            DistanceMetric::L2 | DistanceMetric::InnerProduct => None,
        }
    }

    /// RediSearch `DISTANCE_METRIC` argument
    pub fn redis_name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "COSINE",
            DistanceMetric::L2 => "L2",
            DistanceMetric::InnerProduct => "IP",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::L2 => write!(f, "l2"),
            DistanceMetric::InnerProduct => write!(f, "ip"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            "ip" | "inner_product" => Ok(DistanceMetric::InnerProduct),
            _ => Err(DomainError::configuration(format!(
                "Unknown distance metric: {}. Valid metrics: cosine, l2, ip",
                s
            ))),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

/// Cosine similarity accumulated in f64
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}
