//! Run command: harvest feeds into the review store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use tokio_util::sync::CancellationToken;

use reviewharvest::browser::ChromiumFactory;
use reviewharvest::config::HarvestConfig;
use reviewharvest::models::load_feeds;
use reviewharvest::{
    harvest_all, FeedDescriptor, MemorySink, RecordSink, SessionResult, SessionStatus,
};

use crate::cli::helpers::{database_url, open_sink};
use crate::cli::icons::{arrow, error, success, warning};

pub struct RunOptions {
    pub feeds: Option<PathBuf>,
    pub urls: Vec<String>,
    pub target: Option<usize>,
    pub concurrency: Option<usize>,
    pub db: Option<String>,
    pub dry_run: bool,
    pub json: bool,
}

/// Harvest every requested feed and print per-feed results.
pub async fn cmd_run(mut config: HarvestConfig, options: RunOptions) -> anyhow::Result<()> {
    if let Some(target) = options.target {
        config.target_count = target;
    }
    if let Some(concurrency) = options.concurrency {
        config.concurrency = concurrency;
    }
    config.validate()?;

    let mut feeds = match &options.feeds {
        Some(path) => load_feeds(path)?,
        None => Vec::new(),
    };
    feeds.extend(options.urls.iter().map(FeedDescriptor::from_url));
    if feeds.is_empty() {
        anyhow::bail!("No feeds given. Use --feeds FILE or --url URL.");
    }

    let sink: Arc<dyn RecordSink> = if options.dry_run {
        Arc::new(MemorySink::new())
    } else {
        let url = database_url(options.db.as_deref(), &config);
        Arc::new(open_sink(&url).await?)
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} Interrupted, finishing current iterations", warning());
            on_signal.cancel();
        }
    });

    let factory = Arc::new(ChromiumFactory::new(config.browser.clone()));
    let config = Arc::new(config);

    if !options.json {
        println!(
            "{} Harvesting {} feed(s), target {} records each",
            arrow(),
            feeds.len(),
            config.target_count
        );
    }

    let results = harvest_all(factory, sink.clone(), config, feeds, cancel).await;

    if options.json {
        let out =
            serde_json::to_string_pretty(&results).context("Failed to serialize results")?;
        println!("{}", out);
        return Ok(());
    }

    for result in &results {
        print_result(result);
    }

    let stored = sink.count(None).await?;
    let failed = results
        .iter()
        .filter(|r| {
            matches!(
                r.status,
                SessionStatus::Failed | SessionStatus::Blocked | SessionStatus::Cancelled
            )
        })
        .count();
    println!(
        "\n{} {} feed(s), {} failed, {} records stored",
        style("Done:").bold(),
        results.len(),
        failed,
        stored
    );

    Ok(())
}

fn print_result(result: &SessionResult) {
    let icon = match result.status {
        SessionStatus::Converged => success(),
        SessionStatus::Stagnated | SessionStatus::TimedOut => warning(),
        _ => error(),
    };
    println!(
        "{} {} [{}] {} collected, {} new",
        icon,
        style(&result.name).bold(),
        result.status,
        result.collected_count,
        result.new_count
    );
    if let Some(reason) = &result.reason {
        println!("  {} {}", arrow(), reason);
    }
    if result.failed_upserts > 0 {
        println!(
            "  {} {} records could not be stored",
            warning(),
            result.failed_upserts
        );
    }
}
