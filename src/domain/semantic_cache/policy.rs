//! Cache policy configuration

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::DistanceMetric;
use crate::domain::DomainError;

/// Which call-context dimensions partition the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFlags {
    #[serde(default = "default_true")]
    pub include_app_name: bool,

    #[serde(default = "default_true")]
    pub include_user_id: bool,

    #[serde(default)]
    pub include_session_id: bool,
}

impl Default for ScopeFlags {
    fn default() -> Self {
        Self {
            include_app_name: true,
            include_user_id: true,
            include_session_id: false,
        }
    }
}

/// Policy for one cache controller, fixed for its lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Master switch; a disabled policy treats every call as not cacheable
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Label used in logs, metrics and entry keys
    #[serde(default = "default_name")]
    pub name: String,

    /// Maximum vector distance for a candidate to count as a hit
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,

    /// Seconds until a stored entry expires
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    #[serde(flatten)]
    pub scope_flags: ScopeFlags,

    /// Only cache the first user turn of a session (model calls only)
    #[serde(default = "default_true")]
    pub first_message_only: bool,

    /// Tools whose results may be cached; any other tool never is
    #[serde(default)]
    pub eligible_tool_names: BTreeSet<String>,
}

fn default_true() -> bool {
    true
}

fn default_name() -> String {
    "llm".to_string()
}

fn default_distance_threshold() -> f32 {
    0.1
}

fn default_ttl_seconds() -> u64 {
    3600
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            name: default_name(),
            distance_threshold: default_distance_threshold(),
            ttl_seconds: default_ttl_seconds(),
            scope_flags: ScopeFlags::default(),
            first_message_only: true,
            eligible_tool_names: BTreeSet::new(),
        }
    }
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for a tool-result cache
    pub fn for_tools() -> Self {
        Self {
            name: "tool".to_string(),
            first_message_only: false,
            ..Self::default()
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_distance_threshold(mut self, threshold: f32) -> Self {
        self.distance_threshold = threshold;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_seconds = ttl.as_secs();
        self
    }

    pub fn with_include_app_name(mut self, include: bool) -> Self {
        self.scope_flags.include_app_name = include;
        self
    }

    pub fn with_include_user_id(mut self, include: bool) -> Self {
        self.scope_flags.include_user_id = include;
        self
    }

    pub fn with_include_session_id(mut self, include: bool) -> Self {
        self.scope_flags.include_session_id = include;
        self
    }

    pub fn with_first_message_only(mut self, first_only: bool) -> Self {
        self.first_message_only = first_only;
        self
    }

    pub fn with_eligible_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.eligible_tool_names.insert(tool_name.into());
        self
    }

    pub fn is_tool_eligible(&self, tool_name: &str) -> bool {
        self.eligible_tool_names.contains(tool_name)
    }

    /// Reject policies that cannot be enforced against an index using `metric`
    pub fn validate(&self, metric: DistanceMetric) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::configuration("Cache policy name must not be empty"));
        }

        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            return Err(DomainError::configuration(format!(
                "Invalid distance threshold {} for cache '{}': must be a finite value >= 0",
                self.distance_threshold, self.name
            )));
        }

        if let Some(max) = metric.max_distance() {
            if self.distance_threshold > max {
                return Err(DomainError::configuration(format!(
                    "Invalid distance threshold {} for cache '{}': {} distance never exceeds {}",
                    self.distance_threshold, self.name, metric, max
                )));
            }
        }

        if self.ttl_seconds == 0 {
            return Err(DomainError::configuration(format!(
                "Invalid TTL for cache '{}': ttl_seconds must be greater than 0",
                self.name
            )));
        }

        Ok(())
    }
}
