//! Remove stale cache entries

use std::path::PathBuf;

use anyhow::{Context, Result};
use entweave_codegen::CacheController;

use super::load_config;

/// Run the clean command
pub async fn run(config_path: &str, cache: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let root = cache.unwrap_or_else(|| config.base_path.join(&config.project.cache_dir));

    let cache = CacheController::new(&root);
    let removed = cache.clean().context("Failed to clean cache")?;

    tracing::info!(
        "✓ Removed {} stale cache versions from {}",
        removed,
        root.display()
    );
    Ok(())
}
