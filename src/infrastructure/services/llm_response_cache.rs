//! Model response cache hooks

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::cache_controller::CacheController;
use super::hooks::{BeforeCall, CallToken};
use crate::domain::semantic_cache::{CacheResult, LlmCall};
use crate::domain::{CallContext, LlmRequest, LlmResponse};
use crate::infrastructure::observability::StoreOutcome;

/// Caches model responses keyed on the system instruction and last user message
#[derive(Debug, Clone)]
pub struct LlmResponseCache {
    controller: Arc<CacheController>,
}

impl LlmResponseCache {
    pub fn new(controller: Arc<CacheController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<CacheController> {
        &self.controller
    }

    /// Look up a cached response before calling the model
    pub async fn before_model(
        &self,
        context: &CallContext,
        request: &LlmRequest,
    ) -> BeforeCall<LlmResponse> {
        let call = LlmCall::new(context, request);

        match self.controller.lookup(&call).await {
            CacheResult::Hit(hit) => match serde_json::from_value::<LlmResponse>(hit.payload) {
                Ok(response) => BeforeCall::ShortCircuit(response),
                Err(e) => {
                    warn!(
                        key = %hit.key,
                        error = %e,
                        "Cached response is unreadable, calling model"
                    );
                    let miss = self.controller.prepare_store(&call).await;
                    BeforeCall::Proceed(CallToken::new(miss))
                }
            },
            CacheResult::Miss(miss) => BeforeCall::Proceed(CallToken::new(miss)),
        }
    }

    /// Store the model's response once it has fully completed
    ///
    /// Error responses, tool-call requests, responses without text and
    /// partial (streamed) chunks are never stored.
    pub async fn after_model(&self, token: CallToken, response: &LlmResponse) -> StoreOutcome {
        if !token.is_cacheable() {
            return StoreOutcome::Skipped;
        }

        if let Some(reason) = skip_reason(response) {
            debug!(cache = %self.controller.name(), reason, "Not caching model response");
            return StoreOutcome::Skipped;
        }

        match serde_json::to_value(response) {
            Ok(payload) => self.controller.store(token.miss, payload).await,
            Err(e) => {
                warn!(error = %e, "Failed to serialize model response for cache");
                StoreOutcome::Error
            }
        }
    }

    /// Run `call_model` behind the cache
    ///
    /// On a hit the closure is never invoked. On a miss the response is
    /// stored only if the closure resolved to `Ok`.
    pub async fn call_model<F, Fut, E>(
        &self,
        context: &CallContext,
        request: &LlmRequest,
        call_model: F,
    ) -> Result<LlmResponse, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LlmResponse, E>>,
    {
        match self.before_model(context, request).await {
            BeforeCall::ShortCircuit(response) => Ok(response),
            BeforeCall::Proceed(token) => {
                let response = call_model().await?;
                self.after_model(token, &response).await;
                Ok(response)
            }
        }
    }
}

fn skip_reason(response: &LlmResponse) -> Option<&'static str> {
    if response.error_message.is_some() {
        return Some("error_response");
    }
    if !response.tool_calls.is_empty() {
        return Some("tool_call");
    }
    if response.partial {
        return Some("partial");
    }
    if response.content().map(str::trim).unwrap_or_default().is_empty() {
        return Some("no_text");
    }
    None
}
