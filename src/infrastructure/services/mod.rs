//! Infrastructure services

mod cache_controller;
mod hooks;
mod llm_response_cache;
mod tool_result_cache;

pub use cache_controller::{CacheController, CacheTimeouts, ControllerOptions};
pub use hooks::{BeforeCall, CallToken};
pub use llm_response_cache::LlmResponseCache;
pub use tool_result_cache::ToolResultCache;
