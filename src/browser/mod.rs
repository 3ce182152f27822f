//! Render driver contract and the Chromium backend.
//!
//! The harvest loop only talks to [`RenderDriver`]: navigate, snapshot,
//! evaluate a script, click, wait. Drivers never retry; retry policy
//! belongs to the caller.

pub mod scripts;

#[cfg(feature = "browser")]
mod chromium;
#[cfg(feature = "browser")]
mod launch;
#[cfg(feature = "browser")]
mod stealth;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::BrowserEngineConfig;
use crate::models::FeedDescriptor;

#[cfg(feature = "browser")]
pub use chromium::ChromiumDriver;

/// Serialized structural snapshot (page markup).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Snapshot {
    fn from(markup: String) -> Self {
        Self(markup)
    }
}

impl AsRef<str> for Snapshot {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors from render driver operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("Script evaluation failed: {0}")]
    Script(String),
    #[error("Click on '{selector}' failed: {message}")]
    Click { selector: String, message: String },
    #[error("Element not found: {selector}")]
    NotFound { selector: String },
    #[error("Browser unavailable: {0}")]
    Unavailable(String),
}

/// Contract over a remote rendering engine. One driver serves one session.
#[async_trait]
pub trait RenderDriver: Send {
    /// Load `url` and return the resulting snapshot.
    async fn navigate(&mut self, url: &str) -> Result<Snapshot, RenderError>;

    /// Current structural snapshot.
    async fn snapshot(&mut self) -> Result<Snapshot, RenderError>;

    /// Evaluate a function expression with JSON arguments.
    async fn run_script(&mut self, script: &str, args: &[Value]) -> Result<Value, RenderError>;

    /// Click the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), RenderError>;

    /// Wait until an element matching `selector` exists.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Release browser resources. Errors are not interesting at this point.
    async fn close(&mut self) {}
}

/// Opens one isolated driver per harvest session.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn open(&self, feed: &FeedDescriptor) -> Result<Box<dyn RenderDriver>, RenderError>;
}

/// Run a driver operation under a deadline.
pub async fn bounded<T, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T, RenderError>
where
    F: Future<Output = Result<T, RenderError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout { operation, timeout }),
    }
}

/// Factory for Chromium-backed drivers.
pub struct ChromiumFactory {
    config: BrowserEngineConfig,
}

impl ChromiumFactory {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl DriverFactory for ChromiumFactory {
    async fn open(&self, feed: &FeedDescriptor) -> Result<Box<dyn RenderDriver>, RenderError> {
        tracing::debug!("Opening browser for {}", feed.name);
        let driver = ChromiumDriver::launch(&self.config).await?;
        Ok(Box::new(driver))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl DriverFactory for ChromiumFactory {
    async fn open(&self, _feed: &FeedDescriptor) -> Result<Box<dyn RenderDriver>, RenderError> {
        let _ = &self.config;
        Err(RenderError::Unavailable(
            "Browser support not compiled. Rebuild with: cargo build --features browser".into(),
        ))
    }
}
