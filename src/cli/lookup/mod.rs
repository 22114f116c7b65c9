//! Lookup command - runs a model-cache lookup and prints the outcome

use serde_json::{Value, json};

use super::CallArgs;
use crate::domain::semantic_cache::{CacheResult, LlmCall};

pub async fn run(args: CallArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let caches = crate::create_caches(&config).await?;

    let context = args.context();
    let request = args.request();
    let result = caches
        .llm
        .controller()
        .lookup(&LlmCall::new(&context, &request))
        .await;

    println!("{}", serde_json::to_string_pretty(&report(&result))?);
    Ok(())
}

fn report(result: &CacheResult) -> Value {
    match result {
        CacheResult::Hit(hit) => json!({
            "outcome": "hit",
            "key": hit.key,
            "distance": hit.distance,
            "cached_at": hit.cached_at,
            "answer": hit.payload.pointer("/message/content").cloned().unwrap_or(Value::Null),
            "payload": hit.payload,
        }),
        CacheResult::Miss(miss) => json!({
            "outcome": "miss",
            "cacheable": miss.is_cacheable(),
            "reason": miss.reason().map(|r| r.as_str()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::semantic_cache::{CacheHit, CacheMiss, NotCacheable};

    #[test]
    fn test_report_hit() {
        let result = CacheResult::Hit(CacheHit {
            payload: json!({"message": {"content": "Paris."}}),
            distance: 0.05,
            key: "abc".to_string(),
            cached_at: 1_700_000_000_000,
        });

        let report = report(&result);
        assert_eq!(report["outcome"], "hit");
        assert_eq!(report["answer"], "Paris.");
        assert_eq!(report["key"], "abc");
    }

    #[test]
    fn test_report_not_cacheable_miss() {
        let result = CacheResult::Miss(CacheMiss::not_cacheable(NotCacheable::EmptyPrompt));

        let report = report(&result);
        assert_eq!(report["outcome"], "miss");
        assert_eq!(report["cacheable"], false);
        assert_eq!(report["reason"], "empty_prompt");
    }
}
