//! Shared fixtures for integration tests: a scripted render driver, a
//! factory handing those drivers out, and review page builders.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use reviewharvest::browser::scripts::{
    EXPAND_MORE, FEED_HEIGHT, OPEN_PANEL_BY_TEXT, SCROLL_STEP, SORT_CYCLE,
};
use reviewharvest::config::HarvestConfig;
use reviewharvest::sink::SinkResult;
use reviewharvest::{
    CandidateRecord, DriverFactory, FeedDescriptor, MemorySink, RecordSink, RenderDriver,
    RenderError, SinkError, Snapshot,
};

/// One review block in the layout the extractor expects.
pub fn review(id: &str, author: &str, text: &str) -> String {
    format!(
        r#"<div class="jftiEf" data-review-id="{id}">
             <div class="d4r55">{author}</div>
             <span role="img" aria-label="4 stars"></span>
             <span class="rsqaWe">2 days ago</span>
             <div class="MyEned"><span class="wiI7pd">{text}</span></div>
           </div>"#
    )
}

/// A page holding reviews `r{start}` through `r{end - 1}`.
pub fn page(range: std::ops::Range<usize>) -> String {
    let body: String = range
        .map(|n| {
            review(
                &format!("r{}", n),
                &format!("Author {}", n),
                &format!("Review number {} has enough text to keep.", n),
            )
        })
        .collect();
    wrap(&body)
}

pub fn wrap(body: &str) -> String {
    format!(r#"<html><body><div role="main">{}</div></body></html>"#, body)
}

pub fn blocked_page() -> String {
    wrap("<p>Our systems have detected unusual traffic from your computer network.</p>")
}

/// Pages that grow by `step` reviews per scroll.
pub fn growing_pages(count: usize, step: usize) -> Vec<String> {
    (0..count).map(|i| page(0..(i + 1) * step)).collect()
}

/// Config with no pauses and a small patience.
pub fn fast_config() -> HarvestConfig {
    HarvestConfig {
        target_count: 10,
        scroll_pause_ms: 0,
        pause_jitter_ms: 0,
        stagnation_patience: Some(3),
        low_yield_floor: 0,
        low_yield_retries: 0,
        reshuffle_after: 0,
        feed_delay_ms: 0,
        max_attempts: 5,
        ..HarvestConfig::default()
    }
}

pub fn feed(id: &str) -> FeedDescriptor {
    FeedDescriptor::new(
        format!("Place {}", id),
        format!("https://maps.example.com/place?cid={}", id),
    )
}

/// Driver replaying a fixed list of pages. Each scroll advances one page
/// (sticking at the last); the container height follows the page index.
pub struct ScriptedDriver {
    pages: Vec<String>,
    index: usize,
    scrolls: usize,
    navigate_failures: usize,
    snapshot_failures: usize,
    panic_on_scroll: Option<usize>,
    cancel_on_scroll: Option<(usize, CancellationToken)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDriver {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            index: 0,
            scrolls: 0,
            navigate_failures: 0,
            snapshot_failures: 0,
            panic_on_scroll: None,
            cancel_on_scroll: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_navigations(mut self, n: usize) -> Self {
        self.navigate_failures = n;
        self
    }

    pub fn failing_snapshots(mut self, n: usize) -> Self {
        self.snapshot_failures = n;
        self
    }

    pub fn panic_on_scroll(mut self, n: usize) -> Self {
        self.panic_on_scroll = Some(n);
        self
    }

    pub fn cancel_on_scroll(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_on_scroll = Some((n, token));
        self
    }

    /// Names of the operations performed, in order.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }

    fn log(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn current(&self) -> Snapshot {
        Snapshot::new(self.pages.get(self.index).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl RenderDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str) -> Result<Snapshot, RenderError> {
        self.log("navigate");
        if self.navigate_failures > 0 {
            self.navigate_failures -= 1;
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: "connection reset".into(),
            });
        }
        self.index = 0;
        Ok(self.current())
    }

    async fn snapshot(&mut self) -> Result<Snapshot, RenderError> {
        self.log("snapshot");
        if self.snapshot_failures > 0 {
            self.snapshot_failures -= 1;
            return Err(RenderError::Script("page crashed".into()));
        }
        Ok(self.current())
    }

    async fn run_script(&mut self, script: &str, _args: &[Value]) -> Result<Value, RenderError> {
        if script == SCROLL_STEP {
            self.log("scroll");
            self.scrolls += 1;
            if self.panic_on_scroll == Some(self.scrolls) {
                panic!("renderer died on scroll {}", self.scrolls);
            }
            if let Some((n, token)) = &self.cancel_on_scroll {
                if *n == self.scrolls {
                    token.cancel();
                }
            }
            self.index = (self.index + 1).min(self.pages.len().saturating_sub(1));
            Ok(json!(1))
        } else if script == FEED_HEIGHT {
            Ok(json!((self.index as u64 + 1) * 1000))
        } else if script == EXPAND_MORE {
            self.log("expand");
            Ok(json!(0))
        } else if script == OPEN_PANEL_BY_TEXT {
            self.log("open_panel");
            Ok(json!(false))
        } else if script == SORT_CYCLE {
            self.log("sort");
            Ok(Value::Null)
        } else {
            Err(RenderError::Script("unknown script".into()))
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), RenderError> {
        Err(RenderError::NotFound {
            selector: selector.to_string(),
        })
    }

    async fn wait_for(&mut self, _selector: &str, _timeout: Duration) -> Result<(), RenderError> {
        Ok(())
    }

    async fn close(&mut self) {
        self.log("close");
    }
}

/// Hands out a pre-built driver per feed URL.
#[derive(Default)]
pub struct FakeFactory {
    drivers: Mutex<HashMap<String, ScriptedDriver>>,
}

impl FakeFactory {
    pub fn with(self, feed: &FeedDescriptor, driver: ScriptedDriver) -> Self {
        self.drivers.lock().unwrap().insert(feed.url.clone(), driver);
        self
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    async fn open(&self, feed: &FeedDescriptor) -> Result<Box<dyn RenderDriver>, RenderError> {
        let driver = self.drivers.lock().unwrap().remove(&feed.url);
        match driver {
            Some(driver) => Ok(Box::new(driver)),
            None => Err(RenderError::Unavailable("no browser for this feed".into())),
        }
    }
}

/// Memory sink that refuses some fingerprints.
pub struct FlakySink {
    pub inner: MemorySink,
    reject: HashSet<String>,
}

impl FlakySink {
    pub fn rejecting(fingerprints: &[&str]) -> Self {
        Self {
            inner: MemorySink::new(),
            reject: fingerprints.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl RecordSink for FlakySink {
    async fn upsert(&self, source_id: &str, record: &CandidateRecord) -> SinkResult<()> {
        if self.reject.contains(&record.fingerprint) {
            return Err(SinkError::Database("disk I/O error".into()));
        }
        self.inner.upsert(source_id, record).await
    }

    async fn list(&self, source_id: Option<&str>) -> SinkResult<Vec<CandidateRecord>> {
        self.inner.list(source_id).await
    }

    async fn count(&self, source_id: Option<&str>) -> SinkResult<usize> {
        self.inner.count(source_id).await
    }
}

/// Fingerprints stored for a source, sorted.
pub async fn stored_ids(sink: &dyn RecordSink, source_id: &str) -> Vec<String> {
    let mut ids: Vec<String> = sink
        .list(Some(source_id))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.fingerprint)
        .collect();
    ids.sort();
    ids
}

pub fn ids(range: std::ops::Range<usize>) -> Vec<String> {
    let mut ids: Vec<String> = range.map(|n| format!("r{}", n)).collect();
    ids.sort();
    ids
}
