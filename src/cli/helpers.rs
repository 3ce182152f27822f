//! Shared helper functions for CLI commands.

use std::path::Path;

use anyhow::Context;

use reviewharvest::config::HarvestConfig;
use reviewharvest::SqliteSink;

/// Database used when neither flags, config nor environment name one.
pub const DEFAULT_DATABASE: &str = "reviews.db";

/// Load configuration from an optional TOML file, then apply environment
/// overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<HarvestConfig> {
    let config = match path {
        Some(path) => HarvestConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => HarvestConfig::default(),
    };
    Ok(config.with_env_overrides())
}

/// Pick the database path: explicit flag first, then config/environment.
pub fn database_url(flag: Option<&str>, config: &HarvestConfig) -> String {
    flag.map(str::to_string)
        .or_else(|| config.database_url.clone())
        .unwrap_or_else(|| DEFAULT_DATABASE.to_string())
}

pub async fn open_sink(url: &str) -> anyhow::Result<SqliteSink> {
    SqliteSink::open(url)
        .await
        .with_context(|| format!("Failed to open review store {}", url))
}

/// Read a saved snapshot from disk.
pub fn read_snapshot(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))
}
