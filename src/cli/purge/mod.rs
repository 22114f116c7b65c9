//! Purge command - drops expired entries from both caches

use serde_json::json;
use tracing::info;

use crate::infrastructure::services::CacheController;

pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let caches = crate::create_caches(&config).await?;

    let report = json!({
        "llm": purge(caches.llm.controller()).await?,
        "tools": purge(caches.tools.controller()).await?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

async fn purge(controller: &CacheController) -> anyhow::Result<serde_json::Value> {
    let purged = controller.purge_expired().await?;
    let size = controller.size().await?;

    info!(cache = %controller.name(), purged, size, "Purged expired entries");
    Ok(json!({ "purged": purged, "size": size }))
}
