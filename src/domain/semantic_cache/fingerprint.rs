//! Deterministic derivation of discriminant text, scope and key

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CachePolicy, CacheScope};
use crate::domain::context::CallContext;
use crate::domain::llm::LlmRequest;
use crate::domain::tool::ToolCall;

const KEY_SEPARATOR: u8 = 0x1f;

/// Identity of a cacheable call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Text that gets embedded and compared
    pub discriminant: String,
    pub scope: CacheScope,
    /// Hash of namespace, enabled scope dimensions and discriminant
    pub key: String,
}

impl Fingerprint {
    pub fn new(discriminant: impl Into<String>, scope: CacheScope, namespace: &str) -> Self {
        let discriminant = discriminant.into();

        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([KEY_SEPARATOR]);
        hasher.update(scope.tag().as_bytes());
        hasher.update([KEY_SEPARATOR]);
        hasher.update(discriminant.as_bytes());
        let key = hex::encode(hasher.finalize());

        Self {
            discriminant,
            scope,
            key,
        }
    }
}

/// Why a call bypasses the cache entirely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotCacheable {
    /// The policy is switched off
    Disabled,
    /// `first_message_only` is set and the session already has user turns
    NotFirstMessage,
    /// No prompt text to build a discriminant from
    EmptyPrompt,
    /// Tool is not on the allow-list
    ToolNotEligible,
    /// The vectorizer failed, timed out or returned an unusable vector
    EmbeddingUnavailable,
    /// The similarity index failed or timed out during lookup
    IndexUnavailable,
}

impl NotCacheable {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotCacheable::Disabled => "disabled",
            NotCacheable::NotFirstMessage => "not_first_message",
            NotCacheable::EmptyPrompt => "empty_prompt",
            NotCacheable::ToolNotEligible => "tool_not_eligible",
            NotCacheable::EmbeddingUnavailable => "embedding_unavailable",
            NotCacheable::IndexUnavailable => "index_unavailable",
        }
    }
}

impl fmt::Display for NotCacheable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A call that can be fingerprinted under a policy
pub trait CacheableCall: Send + Sync {
    fn fingerprint(&self, policy: &CachePolicy) -> Result<Fingerprint, NotCacheable>;

    /// Short description for log lines
    fn describe(&self) -> String;
}

/// A model call: session context plus the rendered request
#[derive(Debug, Clone, Copy)]
pub struct LlmCall<'a> {
    pub context: &'a CallContext,
    pub request: &'a LlmRequest,
}

impl<'a> LlmCall<'a> {
    pub fn new(context: &'a CallContext, request: &'a LlmRequest) -> Self {
        Self { context, request }
    }
}

impl CacheableCall for LlmCall<'_> {
    fn fingerprint(&self, policy: &CachePolicy) -> Result<Fingerprint, NotCacheable> {
        if policy.first_message_only && !self.context.is_first_turn() {
            return Err(NotCacheable::NotFirstMessage);
        }

        let prompt = self
            .request
            .last_user_text()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(NotCacheable::EmptyPrompt)?;

        let discriminant = match self.request.system_text() {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        };

        let scope = CacheScope::from_context(self.context, &policy.scope_flags);
        Ok(Fingerprint::new(discriminant, scope, &policy.name))
    }

    fn describe(&self) -> String {
        let prompt = self.request.last_user_text().unwrap_or_default();
        truncate(prompt, 50)
    }
}

/// A tool call: session context plus tool name and arguments
#[derive(Debug, Clone, Copy)]
pub struct ToolInvocation<'a> {
    pub context: &'a CallContext,
    pub call: &'a ToolCall,
}

impl<'a> ToolInvocation<'a> {
    pub fn new(context: &'a CallContext, call: &'a ToolCall) -> Self {
        Self { context, call }
    }
}

impl CacheableCall for ToolInvocation<'_> {
    fn fingerprint(&self, policy: &CachePolicy) -> Result<Fingerprint, NotCacheable> {
        if !policy.is_tool_eligible(&self.call.name) {
            return Err(NotCacheable::ToolNotEligible);
        }

        let discriminant = format!(
            "tool:{} | args:{}",
            self.call.name,
            self.call.canonical_args()
        );

        let scope = CacheScope::from_context(self.context, &policy.scope_flags);
        Ok(Fingerprint::new(discriminant, scope, &policy.name))
    }

    fn describe(&self) -> String {
        format!("tool {}", self.call.name)
    }
}

/// Cut `text` to at most `max` characters for logging
pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CallContext {
        CallContext::new()
            .with_app_name("travel")
            .with_user_id("u1")
            .with_session_id("s1")
    }

    #[test]
    fn test_llm_fingerprint_is_deterministic() {
        let request = LlmRequest::builder().user("What is the capital of France?").build();
        let ctx = context();
        let policy = CachePolicy::new();

        let a = LlmCall::new(&ctx, &request).fingerprint(&policy).unwrap();
        let b = LlmCall::new(&ctx, &request).fingerprint(&policy).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.discriminant, "What is the capital of France?");
    }

    #[test]
    fn test_system_instruction_is_part_of_discriminant() {
        let ctx = context();
        let plain = LlmRequest::builder().user("Hi").build();
        let with_system = LlmRequest::builder()
            .system_instruction("Reply in French.")
            .user("Hi")
            .build();
        let policy = CachePolicy::new();

        let a = LlmCall::new(&ctx, &plain).fingerprint(&policy).unwrap();
        let b = LlmCall::new(&ctx, &with_system).fingerprint(&policy).unwrap();

        assert_eq!(b.discriminant, "Reply in French.\n\nHi");
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_empty_prompt_not_cacheable() {
        let ctx = context();
        let request = LlmRequest::builder().system("System only").user("   ").build();

        let result = LlmCall::new(&ctx, &request).fingerprint(&CachePolicy::new());
        assert_eq!(result, Err(NotCacheable::EmptyPrompt));
    }

    #[test]
    fn test_first_message_only() {
        let ctx = context().with_prior_user_turns(1);
        let request = LlmRequest::builder().user("follow-up").build();

        let strict = CachePolicy::new();
        let relaxed = CachePolicy::new().with_first_message_only(false);

        assert_eq!(
            LlmCall::new(&ctx, &request).fingerprint(&strict),
            Err(NotCacheable::NotFirstMessage)
        );
        assert!(LlmCall::new(&ctx, &request).fingerprint(&relaxed).is_ok());
    }

    #[test]
    fn test_disabled_dimension_does_not_change_key() {
        let request = LlmRequest::builder().user("Hello").build();
        let ctx_a = context();
        let ctx_b = context().with_session_id("s2");
        let policy = CachePolicy::new();

        let a = LlmCall::new(&ctx_a, &request).fingerprint(&policy).unwrap();
        let b = LlmCall::new(&ctx_b, &request).fingerprint(&policy).unwrap();
        assert_eq!(a.key, b.key);

        let policy = policy.with_include_session_id(true);
        let a = LlmCall::new(&ctx_a, &request).fingerprint(&policy).unwrap();
        let b = LlmCall::new(&ctx_b, &request).fingerprint(&policy).unwrap();
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_tool_fingerprint_sorts_arguments() {
        let ctx = context();
        let policy = CachePolicy::for_tools().with_eligible_tool("get_weather");
        let a = ToolCall::new("get_weather")
            .with_arg("units", "metric")
            .with_arg("city", "Paris");
        let b = ToolCall::new("get_weather")
            .with_arg("city", "Paris")
            .with_arg("units", "metric");

        let fa = ToolInvocation::new(&ctx, &a).fingerprint(&policy).unwrap();
        let fb = ToolInvocation::new(&ctx, &b).fingerprint(&policy).unwrap();

        assert_eq!(fa, fb);
        assert_eq!(
            fa.discriminant,
            r#"tool:get_weather | args:{"city":"Paris","units":"metric"}"#
        );
    }

    #[test]
    fn test_tool_not_on_allow_list() {
        let ctx = context();
        let call = ToolCall::new("send_email");

        let result = ToolInvocation::new(&ctx, &call).fingerprint(&CachePolicy::for_tools());
        assert_eq!(result, Err(NotCacheable::ToolNotEligible));
    }

    #[test]
    fn test_namespace_separates_keys() {
        let a = Fingerprint::new("same", CacheScope::global(), "llm");
        let b = Fingerprint::new("same", CacheScope::global(), "tool");
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("héllo wörld", 4), "héll...");
    }
}
