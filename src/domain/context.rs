//! Per-call context supplied by the host framework

use serde::{Deserialize, Serialize};

/// Identity of the session a model or tool call belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub app_name: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    /// User turns already recorded in the session before this call
    #[serde(default)]
    pub prior_user_turns: u32,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_prior_user_turns(mut self, turns: u32) -> Self {
        self.prior_user_turns = turns;
        self
    }

    /// Whether this call serves the first user message of its session
    pub fn is_first_turn(&self) -> bool {
        self.prior_user_turns == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_turn() {
        assert!(CallContext::new().is_first_turn());
        assert!(!CallContext::new().with_prior_user_turns(1).is_first_turn());
    }
}
