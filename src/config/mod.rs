//! Harvester configuration.
//!
//! Loaded from an optional TOML file, then overridden from the environment
//! (a `.env` file is read by the binary before this runs), then by CLI flags.

mod browser;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use browser::{BrowserEngineConfig, BrowserEngineType, DEFAULT_USER_AGENT};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How long the loop keeps scrolling without visible growth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatienceTier {
    Quick,
    Normal,
    #[default]
    Thorough,
}

impl PatienceTier {
    /// Consecutive non-growing iterations tolerated before stagnation.
    pub fn iterations(&self) -> u32 {
        match self {
            Self::Quick => 6,
            Self::Normal => 20,
            Self::Thorough => 40,
        }
    }
}

impl FromStr for PatienceTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "normal" => Ok(Self::Normal),
            "thorough" => Ok(Self::Thorough),
            other => Err(ConfigError::Invalid(format!(
                "unknown patience tier '{}' (expected quick, normal or thorough)",
                other
            ))),
        }
    }
}

/// Harvester configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarvestConfig {
    /// Records to collect per feed before the session converges.
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    /// Base pause after each scroll step, in milliseconds.
    #[serde(default = "default_scroll_pause_ms")]
    pub scroll_pause_ms: u64,

    /// Upper bound of random jitter added to each pause, in milliseconds.
    #[serde(default = "default_pause_jitter_ms")]
    pub pause_jitter_ms: u64,

    #[serde(default)]
    pub patience: PatienceTier,

    /// Explicit stagnation patience; overrides `patience` when set.
    #[serde(default)]
    pub stagnation_patience: Option<u32>,

    /// Below this many records, running out of patience triggers a retry.
    #[serde(default = "default_low_yield_floor")]
    pub low_yield_floor: usize,

    /// How many times a low-yield feed gets its patience reset.
    #[serde(default = "default_low_yield_retries")]
    pub low_yield_retries: u32,

    /// Per-feed wall-clock ceiling, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Driver errors tolerated per feed before the session fails.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_scroll_min_px")]
    pub scroll_min_px: u32,

    #[serde(default = "default_scroll_max_px")]
    pub scroll_max_px: u32,

    /// Click "More" controls every N iterations (0 disables).
    #[serde(default = "default_expand_every")]
    pub expand_every: u32,

    /// Cycle the sort order after this many consecutive stagnant iterations
    /// (0 disables).
    #[serde(default = "default_reshuffle_after")]
    pub reshuffle_after: u32,

    /// Also click "See translation" controls when expanding.
    #[serde(default)]
    pub click_translations: bool,

    /// Try to open the full reviews panel after navigation.
    #[serde(default = "default_open_panel")]
    pub open_panel: bool,

    /// Feeds harvested concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Delay before starting each feed after the first, in milliseconds.
    #[serde(default = "default_feed_delay_ms")]
    pub feed_delay_ms: u64,

    /// Write the final snapshot of each feed here.
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,

    /// SQLite database path for the persistent sink.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub browser: BrowserEngineConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            scroll_pause_ms: default_scroll_pause_ms(),
            pause_jitter_ms: default_pause_jitter_ms(),
            patience: PatienceTier::default(),
            stagnation_patience: None,
            low_yield_floor: default_low_yield_floor(),
            low_yield_retries: default_low_yield_retries(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            scroll_min_px: default_scroll_min_px(),
            scroll_max_px: default_scroll_max_px(),
            expand_every: default_expand_every(),
            reshuffle_after: default_reshuffle_after(),
            click_translations: false,
            open_panel: default_open_panel(),
            concurrency: default_concurrency(),
            feed_delay_ms: default_feed_delay_ms(),
            debug_dir: None,
            database_url: None,
            browser: BrowserEngineConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Load from a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment variable overrides.
    ///
    /// - `MAX_REVIEWS_PER_BRANCH` - Target count per feed
    /// - `SCROLL_PAUSE_TIME` - Pause in seconds (float)
    /// - `STAGNATION_PATIENCE` - Iterations, or a tier name
    /// - `SCROLL_TIMEOUT` - Per-feed ceiling in seconds
    /// - `MAX_RETRIES` - Driver error budget
    /// - `CLICK_TRANSLATIONS` - Expand translations too
    /// - `HARVEST_CONCURRENCY` - Concurrent feeds
    /// - `HARVEST_DEBUG_DIR` - Snapshot dump directory
    /// - `DATABASE_URL` - SQLite path
    ///
    /// Browser variables are applied to `browser` as in
    /// [`BrowserEngineConfig::with_env_overrides`].
    pub fn with_env_overrides(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(n) = get("MAX_REVIEWS_PER_BRANCH").and_then(|v| v.parse().ok()) {
            self.target_count = n;
        }
        if let Some(secs) = get("SCROLL_PAUSE_TIME").and_then(|v| v.parse::<f64>().ok()) {
            if secs.is_finite() && secs >= 0.0 {
                self.scroll_pause_ms = (secs * 1000.0).round() as u64;
            }
        }
        if let Some(val) = get("STAGNATION_PATIENCE") {
            if let Ok(n) = val.parse::<u32>() {
                self.stagnation_patience = Some(n);
            } else if let Ok(tier) = val.parse::<PatienceTier>() {
                self.patience = tier;
                self.stagnation_patience = None;
            }
        }
        if let Some(n) = get("SCROLL_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.timeout_secs = n;
        }
        if let Some(n) = get("MAX_RETRIES").and_then(|v| v.parse::<u32>().ok()) {
            // Each retry covers a navigation and a follow-up snapshot.
            self.max_attempts = n.saturating_mul(2);
        }
        if let Some(b) = get("CLICK_TRANSLATIONS").and_then(|v| parse_bool(&v)) {
            self.click_translations = b;
        }
        if let Some(n) = get("HARVEST_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.concurrency = n;
        }
        if let Some(dir) = get("HARVEST_DEBUG_DIR") {
            self.debug_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = get("DATABASE_URL") {
            self.database_url = Some(url);
        }

        self.browser = self.browser.apply_env_from(&lookup);
        self
    }

    /// Check that the knobs describe a loop that can terminate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_count == 0 {
            return Err(ConfigError::Invalid("target_count must be > 0".into()));
        }
        if self.effective_patience() == 0 {
            return Err(ConfigError::Invalid(
                "stagnation patience must be > 0".into(),
            ));
        }
        if self.scroll_min_px > self.scroll_max_px {
            return Err(ConfigError::Invalid(format!(
                "scroll_min_px ({}) exceeds scroll_max_px ({})",
                self.scroll_min_px, self.scroll_max_px
            )));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be > 0".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn effective_patience(&self) -> u32 {
        self.stagnation_patience
            .unwrap_or_else(|| self.patience.iterations())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Per-call bound for driver operations.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.timeout.max(1))
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    pub fn feed_delay(&self) -> Duration {
        Duration::from_millis(self.feed_delay_ms)
    }
}

/// Parse common boolean spellings used in environment variables.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_target_count() -> usize {
    200
}

fn default_scroll_pause_ms() -> u64 {
    4000
}

fn default_pause_jitter_ms() -> u64 {
    1500
}

fn default_low_yield_floor() -> usize {
    10
}

fn default_low_yield_retries() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    10
}

fn default_scroll_min_px() -> u32 {
    800
}

fn default_scroll_max_px() -> u32 {
    1300
}

fn default_expand_every() -> u32 {
    2
}

fn default_reshuffle_after() -> u32 {
    5
}

fn default_open_panel() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_feed_delay_ms() -> u64 {
    3000
}
