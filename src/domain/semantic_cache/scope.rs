//! Cache namespace partitioning

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ScopeFlags;
use crate::domain::context::CallContext;

/// The identifying dimensions a cache entry is partitioned by
///
/// Disabled dimensions are absent rather than set to a placeholder, so
/// disabling a dimension widens sharing across it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CacheScope {
    /// Scope covering every call
    pub fn global() -> Self {
        Self::default()
    }

    /// Project a call context onto the enabled dimensions
    pub fn from_context(context: &CallContext, flags: &ScopeFlags) -> Self {
        Self {
            app_name: context.app_name.clone().filter(|_| flags.include_app_name),
            user_id: context.user_id.clone().filter(|_| flags.include_user_id),
            session_id: context.session_id.clone().filter(|_| flags.include_session_id),
        }
    }

    /// Canonical, unambiguous text form of the scope
    pub fn tag(&self) -> String {
        [
            ("app", &self.app_name),
            ("user", &self.user_id),
            ("session", &self.session_id),
        ]
        .iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| format!("{}={}", name, escape(v))))
        .collect::<Vec<_>>()
        .join(";")
    }

    /// Hex digest of [`Self::tag`], safe to use as a store tag value
    pub fn digest(&self) -> String {
        let digest = Sha256::digest(self.tag().as_bytes());
        hex::encode(&digest[..16])
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
