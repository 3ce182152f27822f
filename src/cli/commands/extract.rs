//! Offline extraction from a saved snapshot.

use std::path::Path;

use chrono::Utc;

use reviewharvest::extract::{extract_records, ExtractContext};

use crate::cli::helpers::read_snapshot;

pub fn cmd_extract(snapshot: &Path, source: &str, limit: usize) -> anyhow::Result<()> {
    let html = read_snapshot(snapshot)?;
    let ctx = ExtractContext {
        source_id: source,
        observed_at: Utc::now(),
        limit,
    };
    let records = extract_records(&html, &ctx);
    println!("{}", serde_json::to_string_pretty(&records)?);
    eprintln!("{} records", records.len());
    Ok(())
}
