//! Scroll/expand convergence loop for a single feed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::{HarvestSession, SessionResult, SessionStatus};
use super::stagnation::{StagnationPolicy, Verdict};
use super::HarvestError;
use crate::browser::scripts::{
    EXPAND_MORE, FEED_HEIGHT, MAIN_PANEL, OPEN_PANEL_BY_TEXT, PANEL_SELECTOR, PANEL_TRIGGERS,
    SCROLL_STEP, SORT_CYCLE,
};
use crate::browser::{bounded, RenderDriver, RenderError, Snapshot};
use crate::config::HarvestConfig;
use crate::detect::detect_block;
use crate::extract::{extract_records, ExtractContext};
use crate::models::FeedDescriptor;
use crate::sink::RecordSink;

/// Drives feeds to a terminal state and flushes records as it goes.
#[derive(Clone)]
pub struct Harvester {
    config: Arc<HarvestConfig>,
    sink: Arc<dyn RecordSink>,
}

/// Mutable state of one running session.
struct Run<'a> {
    feed: &'a FeedDescriptor,
    source_id: String,
    session: HarvestSession,
    policy: StagnationPolicy,
    last_snapshot: Option<Snapshot>,
    reshuffles: u32,
}

impl Harvester {
    pub fn new(config: Arc<HarvestConfig>, sink: Arc<dyn RecordSink>) -> Self {
        Self { config, sink }
    }

    /// Harvest one feed until it reaches a terminal state.
    ///
    /// Never fails: every error becomes a terminal status in the result.
    /// Records are upserted after each iteration, so whatever was flushed
    /// stays in the sink even if the caller drops this future.
    pub async fn harvest_feed(
        &self,
        driver: &mut dyn RenderDriver,
        feed: &FeedDescriptor,
        cancel: &CancellationToken,
    ) -> SessionResult {
        let mut run = Run {
            feed,
            source_id: feed.source_id(),
            session: HarvestSession::new(self.config.target_count),
            policy: StagnationPolicy::new(
                self.config.effective_patience(),
                self.config.low_yield_floor,
                self.config.low_yield_retries,
            ),
            last_snapshot: None,
            reshuffles: 0,
        };

        info!("Harvesting {} ({})", feed.name, feed.url);

        match self.setup(driver, &mut run, cancel).await {
            Ok(()) => self.converge(driver, &mut run, cancel).await,
            Err(e) => {
                run.session.finish(e.status(), Some(e.to_string()));
            }
        }

        if let (Some(dir), Some(snapshot)) = (&self.config.debug_dir, &run.last_snapshot) {
            dump_snapshot(dir, &run.source_id, snapshot).await;
        }

        let result = run.session.into_result(feed);
        match result.status {
            SessionStatus::Converged => info!(
                "{}: converged with {} records ({} new)",
                result.name, result.collected_count, result.new_count
            ),
            status => warn!(
                "{}: {} after {} iterations with {} records ({})",
                result.name,
                status,
                result.iterations,
                result.collected_count,
                result.reason.as_deref().unwrap_or("no reason")
            ),
        }
        result
    }

    /// Navigate, check for interstitials, open the reviews panel and run the
    /// first extraction pass.
    async fn setup(
        &self,
        driver: &mut dyn RenderDriver,
        run: &mut Run<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), HarvestError> {
        let timeout = self.config.call_timeout();

        let snapshot = loop {
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }
            if run.session.elapsed() > self.config.timeout() {
                return Err(HarvestError::TimedOut);
            }
            match bounded("navigate", timeout, driver.navigate(&run.feed.url)).await {
                Ok(snapshot) => break snapshot,
                Err(e) => {
                    self.count_error(&mut run.session, "navigate", &e)?;
                    if !self.pause(cancel).await {
                        return Err(HarvestError::Cancelled);
                    }
                }
            }
        };
        run.last_snapshot = Some(snapshot.clone());
        check_blocked(&snapshot)?;

        if self.config.open_panel {
            self.open_panel(driver).await;
        }
        if let Err(e) = bounded(
            "wait_for",
            timeout + Duration::from_secs(1),
            driver.wait_for(MAIN_PANEL, timeout),
        )
        .await
        {
            debug!("Main panel not found: {}", e);
        }

        let snapshot = match bounded("snapshot", timeout, driver.snapshot()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.count_error(&mut run.session, "snapshot", &e)?;
                snapshot
            }
        };
        check_blocked(&snapshot)?;

        self.ingest(&snapshot, run).await;
        let height = self.probe_height(driver).await;
        run.policy.prime(height, run.session.seen_count());
        run.last_snapshot = Some(snapshot);
        Ok(())
    }

    /// Best-effort attempt to open the full reviews panel.
    async fn open_panel(&self, driver: &mut dyn RenderDriver) {
        let timeout = self.config.call_timeout();

        let mut opened = false;
        for trigger in PANEL_TRIGGERS {
            match bounded("click", timeout, driver.click(trigger)).await {
                Ok(()) => {
                    debug!("Opened reviews panel via {}", trigger);
                    opened = true;
                    break;
                }
                Err(e) => debug!("Panel trigger {} unavailable: {}", trigger, e),
            }
        }

        if !opened {
            match bounded(
                "run_script",
                timeout,
                driver.run_script(OPEN_PANEL_BY_TEXT, &[]),
            )
            .await
            {
                Ok(Value::Bool(true)) => {
                    debug!("Opened reviews panel by text match");
                    opened = true;
                }
                Ok(_) => debug!("No reviews panel control found"),
                Err(e) => debug!("Panel text match failed: {}", e),
            }
        }

        if opened {
            if let Err(e) = bounded(
                "wait_for",
                timeout + Duration::from_secs(1),
                driver.wait_for(PANEL_SELECTOR, timeout),
            )
            .await
            {
                debug!("Reviews panel did not appear: {}", e);
            }
        }
    }

    /// The main loop. Returns once the session is terminal.
    async fn converge(
        &self,
        driver: &mut dyn RenderDriver,
        run: &mut Run<'_>,
        cancel: &CancellationToken,
    ) {
        let config = &self.config;
        let timeout = config.call_timeout();

        while run.session.is_running() {
            if cancel.is_cancelled() {
                run.session
                    .finish(SessionStatus::Cancelled, Some("cancelled".into()));
                break;
            }
            if run.session.seen_count() >= config.target_count {
                run.session.finish(SessionStatus::Converged, None);
                break;
            }
            if run.session.elapsed() > config.timeout() {
                let err = HarvestError::TimedOut;
                run.session.finish(err.status(), Some(err.to_string()));
                break;
            }

            run.session.iterations += 1;
            let iteration = run.session.iterations;

            let max_px = config.scroll_max_px.max(config.scroll_min_px);
            let px = rand::rng().random_range(config.scroll_min_px..=max_px);
            if let Err(e) = bounded(
                "scroll",
                timeout,
                driver.run_script(SCROLL_STEP, &[json!(px)]),
            )
            .await
            {
                if self.count_error(&mut run.session, "scroll", &e).is_err() {
                    break;
                }
            }

            if config.expand_every > 0 && iteration % config.expand_every == 0 {
                match bounded(
                    "expand",
                    timeout,
                    driver.run_script(EXPAND_MORE, &[json!(config.click_translations)]),
                )
                .await
                {
                    Ok(clicked) => debug!("Expanded {} controls", clicked),
                    Err(e) => debug!("Expand failed: {}", e),
                }
            }

            if config.reshuffle_after > 0 && run.policy.stagnant() == config.reshuffle_after {
                match bounded(
                    "sort",
                    timeout,
                    driver.run_script(SORT_CYCLE, &[json!(run.reshuffles)]),
                )
                .await
                {
                    Ok(choice) => debug!("Cycled sort order: {}", choice),
                    Err(e) => debug!("Sort cycle failed: {}", e),
                }
                run.reshuffles += 1;
            }

            if !self.pause(cancel).await {
                run.session
                    .finish(SessionStatus::Cancelled, Some("cancelled".into()));
                break;
            }

            let snapshot = match bounded("snapshot", timeout, driver.snapshot()).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    if self.count_error(&mut run.session, "snapshot", &e).is_err() {
                        break;
                    }
                    continue;
                }
            };

            if let Err(e) = check_blocked(&snapshot) {
                run.last_snapshot = Some(snapshot);
                run.session.finish(e.status(), Some(e.to_string()));
                break;
            }

            let height = self.probe_height(driver).await;
            self.ingest(&snapshot, run).await;
            run.last_snapshot = Some(snapshot);

            let verdict = run.policy.observe(height, run.session.seen_count());
            run.session.stagnation_counter = run.policy.stagnant();
            debug!(
                "{}: iteration {} height={:?} seen={} verdict={:?}",
                run.feed.name,
                iteration,
                height,
                run.session.seen_count(),
                verdict
            );

            match verdict {
                Verdict::Progress | Verdict::Waiting { .. } => {}
                Verdict::Retry => info!(
                    "{}: only {} records after {} idle iterations, retrying",
                    run.feed.name,
                    run.session.seen_count(),
                    run.policy.patience()
                ),
                Verdict::Stagnated => {
                    run.session
                        .finish(SessionStatus::Stagnated, Some("stagnated".into()));
                }
            }
        }
    }

    /// Extract, admit and persist the net-new records of one snapshot.
    async fn ingest(&self, snapshot: &Snapshot, run: &mut Run<'_>) {
        let remaining = run.session.remaining();
        if remaining == 0 {
            return;
        }

        // Already-seen records may rank above new ones, so leave room for them.
        let ctx = ExtractContext {
            source_id: &run.source_id,
            observed_at: Utc::now(),
            limit: remaining + run.session.seen_count(),
        };
        let candidates = extract_records(snapshot.as_str(), &ctx);

        let mut admitted = Vec::new();
        for record in candidates {
            if admitted.len() >= remaining {
                break;
            }
            if run.session.admit(&record.fingerprint) {
                admitted.push(record);
            }
        }

        for record in &admitted {
            match self.sink.upsert(&run.source_id, record).await {
                Ok(()) => run.session.new_count += 1,
                Err(e) => {
                    run.session.failed_upserts += 1;
                    warn!(
                        "{}: failed to store record {}: {}",
                        run.feed.name, record.fingerprint, e
                    );
                }
            }
        }

        if !admitted.is_empty() {
            debug!(
                "{}: {} new records ({} total)",
                run.feed.name,
                admitted.len(),
                run.session.seen_count()
            );
        }
    }

    /// Scrollable container height, if the page reports one.
    async fn probe_height(&self, driver: &mut dyn RenderDriver) -> Option<u64> {
        match bounded(
            "height",
            self.config.call_timeout(),
            driver.run_script(FEED_HEIGHT, &[]),
        )
        .await
        {
            Ok(value) => value
                .as_u64()
                .or_else(|| value.as_f64().filter(|h| *h >= 0.0).map(|h| h as u64)),
            Err(e) => {
                debug!("Height probe failed: {}", e);
                None
            }
        }
    }

    /// Count a driver error; fails the session once the budget is spent.
    fn count_error(
        &self,
        session: &mut HarvestSession,
        operation: &str,
        error: &RenderError,
    ) -> Result<(), HarvestError> {
        session.total_attempts += 1;
        warn!(
            "{} failed (attempt {}/{}): {}",
            operation, session.total_attempts, self.config.max_attempts, error
        );
        if session.total_attempts > self.config.max_attempts {
            let err = HarvestError::Exhausted {
                attempts: session.total_attempts,
                source: error.clone(),
            };
            session.finish(err.status(), Some(err.to_string()));
            return Err(err);
        }
        Ok(())
    }

    /// Jittered pause between iterations. Returns false when cancelled.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        let jitter = if self.config.pause_jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.pause_jitter_ms)
        } else {
            0
        };
        let duration = self.config.scroll_pause() + Duration::from_millis(jitter);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

fn check_blocked(snapshot: &Snapshot) -> Result<(), HarvestError> {
    match detect_block(snapshot.as_str()) {
        Some(phrase) => Err(HarvestError::Blocked(phrase)),
        None => Ok(()),
    }
}

/// Write the final snapshot of a feed for selector tuning.
async fn dump_snapshot(dir: &Path, source_id: &str, snapshot: &Snapshot) {
    let name: String = source_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(100)
        .collect();
    let path = dir.join(format!("{}.html", name));

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!("Failed to create debug dir {}: {}", dir.display(), e);
        return;
    }
    match tokio::fs::write(&path, snapshot.as_str()).await {
        Ok(()) => debug!("Wrote snapshot to {}", path.display()),
        Err(e) => warn!("Failed to write snapshot {}: {}", path.display(), e),
    }
}
