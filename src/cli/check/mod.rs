//! Check command - validates configuration by building both caches

use serde_json::json;
use tracing::info;

use crate::infrastructure::services::CacheController;

/// Build both caches and print their effective settings
///
/// Returns an error (and so a non-zero exit) on any configuration problem.
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let caches = crate::create_caches(&config).await?;

    info!("Configuration is valid");

    let report = json!({
        "llm": describe(caches.llm.controller()),
        "tools": describe(caches.tools.controller()),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn describe(controller: &CacheController) -> serde_json::Value {
    let policy = controller.policy();
    let index = controller.index();

    json!({
        "name": policy.name,
        "enabled": policy.enabled,
        "backend": index.backend(),
        "dimensions": index.dimensions(),
        "metric": index.metric().to_string(),
        "distance_threshold": policy.distance_threshold,
        "ttl_seconds": policy.ttl_seconds,
    })
}
