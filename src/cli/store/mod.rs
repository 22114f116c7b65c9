//! Store command - writes a text answer for a prompt

use clap::Args;
use serde_json::{Value, json};

use super::CallArgs;
use crate::domain::semantic_cache::{LlmCall, NotCacheable};
use crate::domain::{LlmResponse, Message};
use crate::infrastructure::observability::StoreOutcome;
use crate::infrastructure::services::CallToken;

/// Arguments for the store command
#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    #[command(flatten)]
    pub call: CallArgs,

    /// Answer to serve for similar prompts
    pub answer: String,

    /// Model name recorded on the stored response
    #[arg(long, default_value = "manual")]
    pub model: String,
}

/// Store the answer, replacing any entry with the same fingerprint
pub async fn run(args: StoreArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let caches = crate::create_caches(&config).await?;

    let context = args.call.context();
    let request = args.call.request();
    let miss = caches
        .llm
        .controller()
        .prepare_store(&LlmCall::new(&context, &request))
        .await;

    let reason = miss.reason();

    let response = LlmResponse::new(
        format!("semcache-{}", chrono::Utc::now().timestamp_millis()),
        args.model,
        Message::assistant(args.answer),
    );
    let outcome = caches.llm.after_model(CallToken::new(miss), &response).await;

    let report = report(outcome, reason);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn report(outcome: StoreOutcome, reason: Option<NotCacheable>) -> Value {
    json!({
        "stored": outcome == StoreOutcome::Stored,
        "outcome": outcome.as_str(),
        "reason": reason.map(|r| r.as_str()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_follows_store_outcome() {
        let failed = report(StoreOutcome::Error, None);
        assert_eq!(failed["stored"], false);
        assert_eq!(failed["outcome"], "error");

        let skipped = report(StoreOutcome::Skipped, Some(NotCacheable::EmptyPrompt));
        assert_eq!(skipped["stored"], false);
        assert_eq!(skipped["reason"], "empty_prompt");

        assert_eq!(report(StoreOutcome::Stored, None)["stored"], true);
    }
}
