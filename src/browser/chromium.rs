//! Chromium render driver over the DevTools protocol.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, Page};
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::launch::{connect_remote, launch_local, spawn_handler};
use super::scripts::invocation;
use super::stealth::STEALTH_SCRIPTS;
use super::{bounded, RenderDriver, RenderError, Snapshot};
use crate::config::{BrowserEngineConfig, BrowserEngineType};

/// Interval between element lookups in [`RenderDriver::wait_for`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One browser page driven for a single harvest session.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    timeout: Duration,
    /// Whether this driver launched (and so owns) the browser process.
    owns_browser: bool,
    // Removed when the driver drops.
    _profile: Option<TempDir>,
}

impl ChromiumDriver {
    /// Launch (or connect to) a browser and open a prepared page.
    pub async fn launch(config: &BrowserEngineConfig) -> Result<Self, RenderError> {
        let timeout = Duration::from_secs(config.timeout.max(1));

        let (browser, handler, profile) = match config.remote_url.as_deref() {
            Some(url) => {
                let (browser, handler) = connect_remote(url, timeout).await?;
                (browser, handler, None)
            }
            None => {
                let profile = tempfile::Builder::new()
                    .prefix("reviewharvest-profile-")
                    .tempdir()
                    .map_err(|e| {
                        RenderError::Unavailable(format!("Failed to create profile dir: {}", e))
                    })?;
                let (browser, handler) = launch_local(config, profile.path()).await?;
                (browser, handler, Some(profile))
            }
        };
        let handler = spawn_handler(handler);

        let page = bounded("new_page", timeout, async {
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Unavailable(format!("Failed to open page: {}", e)))
        })
        .await?;

        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(config.effective_user_agent())
            .accept_language(config.accept_language.clone())
            .build()
            .map_err(RenderError::Unavailable)?;
        page.execute(user_agent)
            .await
            .map_err(|e| RenderError::Unavailable(format!("Failed to set user agent: {}", e)))?;

        if config.engine == BrowserEngineType::Stealth {
            debug!("Installing stealth scripts");
            for script in STEALTH_SCRIPTS {
                let params = AddScriptToEvaluateOnNewDocumentParams::new(script.to_string());
                if let Err(e) = page.execute(params).await {
                    debug!("Stealth script injection skipped: {}", e);
                }
            }
        }

        info!("Browser page ready");

        Ok(Self {
            browser,
            page,
            handler,
            timeout,
            owns_browser: profile.is_some(),
            _profile: profile,
        })
    }
}

#[async_trait]
impl RenderDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> Result<Snapshot, RenderError> {
        let nav_error = |e: chromiumoxide::error::CdpError| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };

        info!("Navigating to {}", url);
        let page = &self.page;
        bounded("navigate", self.timeout, async {
            page.goto(url).await.map_err(nav_error)?;
            page.wait_for_navigation().await.map_err(nav_error)?;
            page.content().await.map(Snapshot::from).map_err(nav_error)
        })
        .await
    }

    async fn snapshot(&mut self) -> Result<Snapshot, RenderError> {
        let page = &self.page;
        bounded("snapshot", self.timeout, async {
            page.content()
                .await
                .map(Snapshot::from)
                .map_err(|e| RenderError::Script(format!("Failed to read page content: {}", e)))
        })
        .await
    }

    async fn run_script(&mut self, script: &str, args: &[Value]) -> Result<Value, RenderError> {
        let params = EvaluateParams::builder()
            .expression(invocation(script, args))
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(RenderError::Script)?;
        let page = &self.page;
        bounded("run_script", self.timeout, async {
            let result = page
                .evaluate_expression(params)
                .await
                .map_err(|e| RenderError::Script(e.to_string()))?;
            Ok(result.value().cloned().unwrap_or(Value::Null))
        })
        .await
    }

    async fn click(&mut self, selector: &str) -> Result<(), RenderError> {
        let click_error = |e: chromiumoxide::error::CdpError| RenderError::Click {
            selector: selector.to_string(),
            message: e.to_string(),
        };

        let page = &self.page;
        bounded("click", self.timeout, async {
            let element = page
                .find_element(selector)
                .await
                .map_err(|_| RenderError::NotFound {
                    selector: selector.to_string(),
                })?;
            element.scroll_into_view().await.map_err(click_error)?;
            element.click().await.map_err(click_error)?;
            Ok(())
        })
        .await
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
        let page = &self.page;
        bounded("wait_for", timeout, async {
            loop {
                if page.find_element(selector).await.is_ok() {
                    return Ok(());
                }
                tokio::time::sleep(WAIT_POLL_INTERVAL).await;
            }
        })
        .await
    }

    async fn close(&mut self) {
        let _ = self.page.clone().close().await;
        if self.owns_browser {
            let _ = self.browser.close().await;
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
    }
}
