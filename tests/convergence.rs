//! Convergence Loop Tests
//!
//! Drives a single feed through the harvester with a scripted driver and
//! checks how each session terminates and what reaches the sink.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::*;
use reviewharvest::config::HarvestConfig;
use reviewharvest::{Harvester, MemorySink, RecordSink, SessionResult, SessionStatus};

async fn harvest(
    config: HarvestConfig,
    driver: &mut ScriptedDriver,
    sink: Arc<dyn RecordSink>,
    cancel: &CancellationToken,
) -> SessionResult {
    let harvester = Harvester::new(Arc::new(config), sink);
    harvester.harvest_feed(driver, &feed("1"), cancel).await
}

fn count_calls(driver: &ScriptedDriver, name: &str) -> usize {
    driver
        .calls()
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.as_str() == name)
        .count()
}

#[tokio::test]
async fn test_converges_at_target() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(growing_pages(10, 3));
    let config = HarvestConfig {
        target_count: 7,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink.clone(), &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Converged);
    assert_eq!(result.collected_count, 7);
    assert_eq!(result.new_count, 7);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.source_id, "1");
    assert!(result.reason.is_none());
    assert_eq!(stored_ids(sink.as_ref(), "1").await, ids(0..7));
}

#[tokio::test]
async fn test_stagnates_after_patience() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(vec![page(0..3)]);

    let result = harvest(fast_config(), &mut driver, sink.clone(), &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Stagnated);
    assert_eq!(result.reason.as_deref(), Some("stagnated"));
    assert_eq!(result.iterations, 3);
    assert_eq!(result.collected_count, 3);
    assert_eq!(sink.count(Some("1")).await.unwrap(), 3);
}

#[tokio::test]
async fn test_low_yield_feed_gets_one_retry() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(vec![page(0..3)]);
    let config = HarvestConfig {
        stagnation_patience: Some(2),
        low_yield_floor: 10,
        low_yield_retries: 1,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink, &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Stagnated);
    assert_eq!(result.iterations, 4);
}

#[tokio::test]
async fn test_sort_cycles_once_per_stagnant_run() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(vec![page(0..3)]);
    let config = HarvestConfig {
        stagnation_patience: Some(4),
        reshuffle_after: 2,
        expand_every: 2,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink, &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Stagnated);
    assert_eq!(result.iterations, 4);
    assert_eq!(count_calls(&driver, "sort"), 1);
    assert_eq!(count_calls(&driver, "expand"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_times_out_on_endless_feed() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(growing_pages(20, 2));
    let config = HarvestConfig {
        target_count: 1000,
        scroll_pause_ms: 4000,
        timeout_secs: 10,
        stagnation_patience: Some(50),
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink, &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::TimedOut);
    assert_eq!(result.reason.as_deref(), Some("timeout"));
    assert_eq!(result.iterations, 3);
    assert_eq!(result.collected_count, 8);
}

#[tokio::test]
async fn test_fails_after_exhausting_attempts() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(growing_pages(5, 2)).failing_snapshots(100);
    let config = HarvestConfig {
        max_attempts: 3,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink.clone(), &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Failed);
    assert!(result.reason.as_deref().unwrap().contains("page crashed"));
    assert_eq!(result.iterations, 3);
    // The navigation snapshot was still harvested.
    assert_eq!(result.collected_count, 2);
    assert_eq!(sink.count(None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_navigation_is_retried() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(growing_pages(5, 2)).failing_navigations(2);
    let config = HarvestConfig {
        target_count: 4,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink, &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Converged);
    assert_eq!(count_calls(&driver, "navigate"), 3);
}

#[tokio::test]
async fn test_navigation_failure_is_terminal() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(growing_pages(5, 2)).failing_navigations(100);
    let config = HarvestConfig {
        max_attempts: 2,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink, &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Failed);
    assert_eq!(result.iterations, 0);
    assert_eq!(count_calls(&driver, "navigate"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_navigation_respects_feed_timeout() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(growing_pages(5, 2)).failing_navigations(1000);
    let config = HarvestConfig {
        scroll_pause_ms: 4000,
        timeout_secs: 10,
        max_attempts: 10,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink, &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::TimedOut);
    assert_eq!(result.reason.as_deref(), Some("timeout"));
    assert_eq!(result.iterations, 0);
    // Failures at 0s, 4s and 8s; the ceiling is hit before a fourth try.
    assert_eq!(count_calls(&driver, "navigate"), 3);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(growing_pages(5, 2));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = harvest(fast_config(), &mut driver, sink, &cancel).await;

    assert_eq!(result.status, SessionStatus::Cancelled);
    assert_eq!(result.reason.as_deref(), Some("cancelled"));
    assert_eq!(count_calls(&driver, "navigate"), 0);
}

#[tokio::test]
async fn test_cancel_keeps_flushed_records() {
    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();
    let mut driver =
        ScriptedDriver::new(growing_pages(10, 2)).cancel_on_scroll(2, cancel.clone());
    let config = HarvestConfig {
        target_count: 100,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink.clone(), &cancel).await;

    assert_eq!(result.status, SessionStatus::Cancelled);
    assert_eq!(result.iterations, 2);
    assert_eq!(stored_ids(sink.as_ref(), "1").await, ids(0..4));
}

#[tokio::test]
async fn test_blocked_on_first_load() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(vec![blocked_page()]);

    let result = harvest(fast_config(), &mut driver, sink.clone(), &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Blocked);
    assert!(result.reason.as_deref().unwrap().starts_with("blocked: "));
    assert_eq!(result.iterations, 0);
    assert_eq!(count_calls(&driver, "scroll"), 0);
    assert_eq!(sink.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_blocked_mid_run_keeps_earlier_records() {
    let sink = Arc::new(MemorySink::new());
    let mut driver = ScriptedDriver::new(vec![page(0..2), page(0..4), blocked_page()]);

    let result = harvest(fast_config(), &mut driver, sink.clone(), &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Blocked);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.collected_count, 4);
    assert_eq!(stored_ids(sink.as_ref(), "1").await, ids(0..4));
}

#[tokio::test]
async fn test_records_leaving_the_page_stay_counted() {
    let sink = Arc::new(MemorySink::new());
    // A virtualized list drops old reviews as new ones render.
    let mut driver = ScriptedDriver::new(vec![page(0..4), page(2..6), page(4..8)]);
    let config = HarvestConfig {
        target_count: 8,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink.clone(), &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Converged);
    assert_eq!(result.collected_count, 8);
    assert_eq!(result.new_count, 8);
    assert_eq!(stored_ids(sink.as_ref(), "1").await, ids(0..8));
}

#[tokio::test]
async fn test_sink_failures_are_counted_not_fatal() {
    let sink = Arc::new(FlakySink::rejecting(&["r1"]));
    let mut driver = ScriptedDriver::new(growing_pages(3, 2));
    let config = HarvestConfig {
        target_count: 4,
        ..fast_config()
    };

    let result = harvest(config, &mut driver, sink.clone(), &CancellationToken::new()).await;

    assert_eq!(result.status, SessionStatus::Converged);
    assert_eq!(result.collected_count, 4);
    assert_eq!(result.new_count, 3);
    assert_eq!(result.failed_upserts, 1);
    assert_eq!(stored_ids(sink.as_ref(), "1").await, vec!["r0", "r2", "r3"]);
}
