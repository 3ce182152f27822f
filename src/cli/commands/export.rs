//! Export stored records as JSON lines or CSV.

use reviewharvest::config::HarvestConfig;
use reviewharvest::sink::{write_csv, write_json_lines};
use reviewharvest::RecordSink;

use super::ExportFormat;
use crate::cli::helpers::{database_url, open_sink};

pub async fn cmd_export(
    config: &HarvestConfig,
    db: Option<&str>,
    source: Option<&str>,
    format: ExportFormat,
) -> anyhow::Result<()> {
    let sink = open_sink(&database_url(db, config)).await?;
    let records = sink.list(source).await?;

    let out = std::io::stdout().lock();
    match format {
        ExportFormat::Json => write_json_lines(out, &records)?,
        ExportFormat::Csv => write_csv(out, &records)?,
    }

    tracing::info!("Exported {} records", records.len());
    Ok(())
}
