//! Multi-feed runner.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::convergence::Harvester;
use super::session::{SessionResult, SessionStatus};
use crate::browser::DriverFactory;
use crate::config::HarvestConfig;
use crate::models::FeedDescriptor;
use crate::sink::RecordSink;

/// Harvest every feed, at most `config.concurrency` at a time.
///
/// Each feed gets its own driver and session. A feed that fails, panics or
/// is blocked only affects its own result. Results come back in feed order.
pub async fn harvest_all(
    factory: Arc<dyn DriverFactory>,
    sink: Arc<dyn RecordSink>,
    config: Arc<HarvestConfig>,
    feeds: Vec<FeedDescriptor>,
    cancel: CancellationToken,
) -> Vec<SessionResult> {
    let harvester = Harvester::new(config.clone(), sink);
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let delay = config.feed_delay();

    info!(
        "Harvesting {} feeds ({} concurrent)",
        feeds.len(),
        config.concurrency.max(1)
    );

    let mut handles = Vec::with_capacity(feeds.len());
    for (index, feed) in feeds.into_iter().enumerate() {
        let factory = factory.clone();
        let harvester = harvester.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let task_feed = feed.clone();

        let handle = tokio::spawn(async move {
            let feed = task_feed;
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return SessionResult::cancelled(&feed);
            };

            // Space out feeds so they do not hit the site back to back.
            if index > 0 && !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return SessionResult::cancelled(&feed),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return SessionResult::cancelled(&feed);
            }

            harvest_one(factory.as_ref(), &harvester, &feed, &cancel).await
        });
        handles.push((feed, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (feed, handle) in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => {
                error!("Session for {} aborted: {}", feed.name, e);
                results.push(SessionResult::failed(
                    &feed,
                    format!("session aborted: {}", e),
                ));
            }
        }
    }

    let converged = results
        .iter()
        .filter(|r| r.status == SessionStatus::Converged)
        .count();
    let collected: usize = results.iter().map(|r| r.collected_count).sum();
    info!(
        "Finished {} feeds: {} converged, {} records collected",
        results.len(),
        converged,
        collected
    );

    results
}

async fn harvest_one(
    factory: &dyn DriverFactory,
    harvester: &Harvester,
    feed: &FeedDescriptor,
    cancel: &CancellationToken,
) -> SessionResult {
    let mut driver = match factory.open(feed).await {
        Ok(driver) => driver,
        Err(e) => {
            warn!("Could not open driver for {}: {}", feed.name, e);
            return SessionResult::failed(feed, e.to_string());
        }
    };

    let result = harvester.harvest_feed(driver.as_mut(), feed, cancel).await;
    driver.close().await;
    result
}
