//! Local Chrome discovery and remote DevTools connection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig, Handler};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::info;

use super::RenderError;
use crate::config::BrowserEngineConfig;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Find a Chrome executable on common paths or `PATH`.
pub(super) fn find_chrome() -> Result<PathBuf, RenderError> {
    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    if let Some(path) = search_path(CHROME_COMMANDS) {
        info!("Found Chrome in PATH: {}", path.display());
        return Ok(path);
    }

    Err(RenderError::Unavailable(
        "Chrome/Chromium not found. Please install it:\n\
         - Arch/Manjaro: sudo pacman -S chromium\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium\n\
         - Or set BROWSER_URL to a running DevTools endpoint"
            .into(),
    ))
}

/// First of `commands` that resolves on `PATH`.
fn search_path(commands: &[&str]) -> Option<PathBuf> {
    commands.iter().find_map(|cmd| which::which(cmd).ok())
}

/// Launch a local browser with its own profile directory.
pub(super) async fn launch_local(
    config: &BrowserEngineConfig,
    profile_dir: &Path,
) -> Result<(Browser, Handler), RenderError> {
    info!("Launching browser (headless={})", config.headless);

    let chrome_path = find_chrome()?;

    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .user_data_dir(profile_dir)
        .window_size(config.window_width, config.window_height)
        .request_timeout(Duration::from_secs(config.timeout));

    // with_head means NOT headless
    if !config.headless {
        builder = builder.with_head();
    }

    if let Some(ref proxy) = config.proxy {
        builder = builder.arg(format!("--proxy-server={}", proxy));
    }

    builder = builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--metrics-recording-only")
        .arg(format!("--lang={}", primary_language(&config.accept_language)))
        .arg("--no-sandbox") // Often needed for headless in containers
        .arg("--disable-gpu");

    for arg in &config.chrome_args {
        builder = builder.arg(arg);
    }

    let browser_config = builder
        .build()
        .map_err(|e| RenderError::Unavailable(format!("Failed to build browser config: {}", e)))?;

    Browser::launch(browser_config)
        .await
        .map_err(|e| RenderError::Unavailable(format!("Failed to launch browser: {}", e)))
}

/// Connect to a remote Chrome instance via its `/json/version` endpoint.
pub(super) async fn connect_remote(
    url: &str,
    timeout: Duration,
) -> Result<(Browser, Handler), RenderError> {
    info!("Connecting to remote browser at {}", url);

    let http_url = url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    let unavailable = |context: &str, e: &dyn std::fmt::Display| {
        RenderError::Unavailable(format!("{}: {}", context, e))
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| unavailable("Failed to build HTTP client", &e))?;

    let resp: serde_json::Value = client
        .get(&version_url)
        .send()
        .await
        .map_err(|e| unavailable("Failed to connect to remote browser", &e))?
        .json()
        .await
        .map_err(|e| unavailable("Failed to parse browser version info", &e))?;

    let ws_url = resp
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RenderError::Unavailable("No webSocketDebuggerUrl in response".into()))?;

    info!("Connecting to WebSocket: {}", ws_url);

    let handler_config = HandlerConfig {
        request_timeout: timeout,
        ..Default::default()
    };

    Browser::connect_with_config(ws_url, handler_config)
        .await
        .map_err(|e| unavailable("Failed to connect to remote browser", &e))
}

/// Drive the CDP handler until the connection closes.
pub(super) fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    })
}

/// First language tag of an Accept-Language value.
fn primary_language(accept_language: &str) -> &str {
    accept_language
        .split([',', ';'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("en-US")
}
