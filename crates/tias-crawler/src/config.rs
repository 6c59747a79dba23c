use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    /// Base delay in seconds between two consecutive requests
    #[serde(default = "default_download_delay")]
    pub download_delay: f32,

    /// Draw every delay uniformly in `[0.5, 1.5] * download_delay`
    #[serde(default = "default_randomize_delay")]
    pub randomize_delay: bool,

    #[serde(default = "default_retry_times")]
    pub retry_times: usize,

    #[serde(default = "default_retry_http_codes")]
    pub retry_http_codes: Vec<u16>,

    #[serde(default = "default_blocked_http_codes")]
    pub blocked_http_codes: Vec<u16>,

    /// Case-insensitive marker that flags a rendered page as blocked
    #[serde(default = "default_blocked_marker")]
    pub blocked_marker: String,

    #[serde(default = "default_on_scrap_error")]
    pub on_scrap_error: OnError,

    #[serde(default = "default_handle_sigint")]
    pub handle_sigint: bool,

    #[serde(default)]
    pub browser: BrowserConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            download_delay: default_download_delay(),
            randomize_delay: default_randomize_delay(),
            retry_times: default_retry_times(),
            retry_http_codes: default_retry_http_codes(),
            blocked_http_codes: default_blocked_http_codes(),
            blocked_marker: default_blocked_marker(),
            on_scrap_error: default_on_scrap_error(),
            handle_sigint: default_handle_sigint(),
            browser: BrowserConfig::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retry_http_codes.contains(&status)
    }

    pub fn is_blocked(&self, status: u16, html: &str) -> bool {
        self.blocked_http_codes.contains(&status)
            || (!self.blocked_marker.is_empty()
                && html
                    .to_lowercase()
                    .contains(&self.blocked_marker.to_lowercase()))
    }
}

fn default_download_delay() -> f32 {
    5.
}

fn default_randomize_delay() -> bool {
    true
}

fn default_retry_times() -> usize {
    3
}

fn default_retry_http_codes() -> Vec<u16> {
    vec![403, 429, 503]
}

fn default_blocked_http_codes() -> Vec<u16> {
    vec![403, 429]
}

fn default_blocked_marker() -> String {
    String::from("forbidden")
}

fn default_on_scrap_error() -> OnError {
    OnError::SkipAndLog
}

fn default_handle_sigint() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OnError {
    Fail,
    SkipAndLog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(default = "default_viewport")]
    pub viewport: (u32, u32),

    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_ignore_https_errors")]
    pub ignore_https_errors: bool,

    /// Navigation timeout in seconds
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout: u64,

    /// One of them is picked at random for every request
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            viewport: default_viewport(),
            locale: default_locale(),
            ignore_https_errors: default_ignore_https_errors(),
            navigation_timeout: default_navigation_timeout(),
            user_agents: default_user_agents(),
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout)
    }
}

fn default_headless() -> bool {
    true
}

fn default_viewport() -> (u32, u32) {
    (1920, 1080)
}

fn default_locale() -> String {
    String::from("en-US")
}

fn default_ignore_https_errors() -> bool {
    true
}

fn default_navigation_timeout() -> u64 {
    60
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36 Edg/127.0.0.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_6_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
