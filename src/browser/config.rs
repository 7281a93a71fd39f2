//! Browser configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classify::default_challenge_titles;

/// URL patterns aborted when media blocking is on.
pub const MEDIA_BLOCK_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.svg", "*.mp3", "*.mp4", "*.avi", "*.flac", "*.ogg",
    "*.wav", "*.webm",
];

/// Local browser process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable. Searched for when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Abort requests for common media files.
    #[serde(default)]
    pub block_media: bool,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
            block_media: false,
            chrome_args: Vec::new(),
        }
    }
}

pub fn default_headless() -> bool {
    true
}

/// Remote anti-bot browser session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSessionConfig {
    /// WebSocket endpoint of the session provider.
    #[serde(default = "default_connect_url")]
    pub connect_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Titles that mark an anti-bot interstitial.
    #[serde(default = "default_challenge_titles")]
    pub challenge_titles: Vec<String>,

    /// Upper bound on waiting for a challenge page to clear, in seconds.
    #[serde(default = "default_challenge_wait")]
    pub challenge_max_wait_secs: u64,

    #[serde(default = "default_challenge_poll")]
    pub challenge_poll_ms: u64,

    /// CDP request timeout for the remote connection, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteSessionConfig {
    fn default() -> Self {
        Self {
            connect_url: default_connect_url(),
            api_key: None,
            challenge_titles: default_challenge_titles(),
            challenge_max_wait_secs: default_challenge_wait(),
            challenge_poll_ms: default_challenge_poll(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

pub fn default_connect_url() -> String {
    "wss://connect.browserbase.com".to_string()
}

pub fn default_challenge_wait() -> u64 {
    30
}

pub fn default_challenge_poll() -> u64 {
    500
}

pub fn default_request_timeout() -> u64 {
    60
}

impl RemoteSessionConfig {
    /// Connection string for one session, optionally routed through proxies.
    pub fn session_url(&self, enable_proxy: bool) -> String {
        let key = self.api_key.as_deref().unwrap_or_default();
        let separator = if self.connect_url.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{}apiKey={}",
            self.connect_url.trim_end_matches('/'),
            separator,
            urlencoding::encode(key)
        );
        if enable_proxy {
            url.push_str("&enableProxy=true");
        }
        url
    }
}
