use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::{FailureKind, FetchError};

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_BROWSER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_NETWORK_IDLE: Duration = Duration::from_millis(1200);
pub const DEFAULT_MAX_BODY_BYTES: u64 = 8 << 20;
pub const DEFAULT_MIN_QUALITY_TEXT: usize = 220;

/// Headroom the batch executor adds above the slower of the two fetch timeouts.
pub const TASK_DEADLINE_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Auto,
    Static,
    Browser,
    Raw,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Static => "static",
            Mode::Browser => "browser",
            Mode::Raw => "raw",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Mode::Auto),
            "static" => Ok(Mode::Static),
            "browser" => Ok(Mode::Browser),
            "raw" => Ok(Mode::Raw),
            _ => Err(FetchError::new(FailureKind::UnsupportedMode, value.trim())),
        }
    }
}

/// Per-fetch settings shared by every strategy of the cascade.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub mode: Mode,
    pub http_timeout: Duration,
    pub browser_timeout: Duration,
    /// Quiet period with no outstanding requests before a render is captured.
    pub network_idle: Duration,
    pub wait_selector: Option<String>,
    pub user_agent: String,
    /// Extra request headers; duplicates are preserved in insertion order.
    pub headers: HeaderMap,
    pub max_body_bytes: u64,
    pub min_quality_text: usize,
    pub include_meta: bool,
    /// Chrome/Chromium executable override for the renderer.
    pub browser_path: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            browser_timeout: DEFAULT_BROWSER_TIMEOUT,
            network_idle: DEFAULT_NETWORK_IDLE,
            wait_selector: None,
            user_agent: default_user_agent(),
            headers: HeaderMap::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            min_quality_text: DEFAULT_MIN_QUALITY_TEXT,
            include_meta: true,
            browser_path: None,
        }
    }
}

impl FetchConfig {
    /// Replaces zero durations and limits with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.http_timeout.is_zero() {
            self.http_timeout = DEFAULT_HTTP_TIMEOUT;
        }
        if self.browser_timeout.is_zero() {
            self.browser_timeout = DEFAULT_BROWSER_TIMEOUT;
        }
        if self.network_idle.is_zero() {
            self.network_idle = DEFAULT_NETWORK_IDLE;
        }
        if self.max_body_bytes == 0 {
            self.max_body_bytes = DEFAULT_MAX_BODY_BYTES;
        }
        if self.min_quality_text == 0 {
            self.min_quality_text = DEFAULT_MIN_QUALITY_TEXT;
        }
        self.wait_selector = self
            .wait_selector
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    /// Upper bound for one URL's whole cascade: `max(http, browser) + 5s`.
    pub fn task_deadline(&self) -> Duration {
        self.http_timeout.max(self.browser_timeout) + TASK_DEADLINE_SLACK
    }
}

pub fn default_user_agent() -> String {
    format!("agent-fetch/{}", env!("CARGO_PKG_VERSION"))
}
