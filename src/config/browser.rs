//! Browser engine configuration types.
//!
//! These types live here (always compiled) rather than behind
//! `#[cfg(feature = "browser")]` so that config parsing works without the
//! browser feature.

use serde::{Deserialize, Serialize};

use super::parse_bool;

/// Browser engine types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngineType {
    /// Chromium with stealth patches (default).
    #[default]
    Stealth,

    /// No stealth patches (for debugging).
    Standard,
}

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    /// Browser engine type.
    #[serde(default)]
    pub engine: BrowserEngineType,

    /// Run in headless mode (default: true).
    /// Set to false for debugging or if headless detection is an issue.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Per-call timeout in seconds for driver operations.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    /// Can also be set via BROWSER_URL environment variable.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// User agent override. Falls back to a desktop Chrome string.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Accept-Language sent with every request.
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngineType::default(),
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            chrome_args: Vec::new(),
            remote_url: None,
            user_agent: None,
            accept_language: default_accept_language(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `PLAYWRIGHT_HEADLESS` / `HEADLESS` - Headless mode
    /// - `PLAYWRIGHT_PROXY` / `HARVEST_PROXY` - Proxy server
    /// - `USER_AGENT` - User agent override
    pub fn with_env_overrides(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(val) = lookup("BROWSER_URL") {
            self.remote_url = Some(val.trim().to_string());
        }

        if let Some(headless) = lookup("PLAYWRIGHT_HEADLESS")
            .or_else(|| lookup("HEADLESS"))
            .and_then(|v| parse_bool(&v))
        {
            self.headless = headless;
        }

        if let Some(proxy) = lookup("PLAYWRIGHT_PROXY").or_else(|| lookup("HARVEST_PROXY")) {
            self.proxy = Some(proxy.trim().to_string());
        }

        if let Some(ua) = lookup("USER_AGENT") {
            self.user_agent = Some(ua);
        }

        self
    }

    /// User agent to present, falling back to the built-in desktop string.
    pub fn effective_user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

/// Desktop Chrome user agent used when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

pub fn default_accept_language() -> String {
    "en-US,en;q=0.9,ar;q=0.8".to_string()
}

pub fn default_window_width() -> u32 {
    1366
}

pub fn default_window_height() -> u32 {
    900
}
