//! CLI module for the semantic call cache
//!
//! Provides subcommands for operating a configured cache:
//! - `check`: validate configuration and build both caches
//! - `lookup`: run a model-cache lookup for a prompt
//! - `store`: store a text answer for a prompt
//! - `purge`: drop expired entries
//!
//! `lookup` and `store` only share state across invocations with the
//! Redis backend; the in-memory index lives for a single process.

pub mod check;
pub mod lookup;
pub mod purge;
pub mod store;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::domain::{CallContext, LlmRequest};
use crate::infrastructure::logging;

/// Semantic Call Cache - serve model responses and tool results for similar calls
#[derive(Parser)]
#[command(name = "semcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate configuration and build both caches
    Check,

    /// Look up a cached model response for a prompt
    Lookup(CallArgs),

    /// Store a text answer for a prompt
    Store(store::StoreArgs),

    /// Purge expired entries and print the remaining size
    Purge,
}

/// Identifies a model call from the command line
#[derive(Args, Clone, Debug)]
pub struct CallArgs {
    /// User prompt
    pub prompt: String,

    /// System instruction sent with the prompt
    #[arg(long)]
    pub system: Option<String>,

    #[arg(long)]
    pub app: Option<String>,

    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub session: Option<String>,
}

impl CallArgs {
    pub fn context(&self) -> CallContext {
        let mut context = CallContext::new();
        if let Some(app) = &self.app {
            context = context.with_app_name(app);
        }
        if let Some(user) = &self.user {
            context = context.with_user_id(user);
        }
        if let Some(session) = &self.session {
            context = context.with_session_id(session);
        }
        context
    }

    pub fn request(&self) -> LlmRequest {
        let mut builder = LlmRequest::builder();
        if let Some(system) = &self.system {
            builder = builder.system(system);
        }
        builder.user(&self.prompt).build()
    }
}

/// Load `.env`, configuration and logging for a subcommand
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}
