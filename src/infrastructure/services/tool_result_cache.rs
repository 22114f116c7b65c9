//! Tool result cache hooks

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use super::cache_controller::CacheController;
use super::hooks::{BeforeCall, CallToken};
use crate::domain::semantic_cache::{CacheResult, ToolInvocation};
use crate::domain::{CallContext, ToolCall};
use crate::infrastructure::observability::StoreOutcome;

/// Caches results of allow-listed tools keyed on tool name and canonical arguments
#[derive(Debug, Clone)]
pub struct ToolResultCache {
    controller: Arc<CacheController>,
}

impl ToolResultCache {
    pub fn new(controller: Arc<CacheController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<CacheController> {
        &self.controller
    }

    pub async fn before_tool(&self, context: &CallContext, call: &ToolCall) -> BeforeCall<Value> {
        let invocation = ToolInvocation::new(context, call);

        match self.controller.lookup(&invocation).await {
            CacheResult::Hit(hit) => BeforeCall::ShortCircuit(hit.payload),
            CacheResult::Miss(miss) => BeforeCall::Proceed(CallToken::new(miss)),
        }
    }

    pub async fn after_tool(&self, token: CallToken, result: &Value) -> StoreOutcome {
        if !token.is_cacheable() {
            return StoreOutcome::Skipped;
        }
        self.controller.store(token.miss, result.clone()).await
    }

    /// Run `call_tool` behind the cache, storing only successful results
    pub async fn call_tool<F, Fut, E>(
        &self,
        context: &CallContext,
        call: &ToolCall,
        call_tool: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        match self.before_tool(context, call).await {
            BeforeCall::ShortCircuit(result) => Ok(result),
            BeforeCall::Proceed(token) => {
                let result = call_tool().await?;
                self.after_tool(token, &result).await;
                Ok(result)
            }
        }
    }
}
