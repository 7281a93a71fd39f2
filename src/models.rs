//! Request and result types shared by every fetch strategy.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::status::describe_status;

/// Default navigation timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Status code reported when the gateway itself failed.
pub const INTERNAL_ERROR_STATUS: u16 = 500;

/// A single "fetch HTML for URL" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,

    /// Pause after the load event before capturing content.
    #[serde(rename = "wait_after_load", default)]
    pub wait_after_load_ms: u64,

    /// Navigation timeout.
    #[serde(rename = "timeout", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wait_after_load_ms: 0,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            headers: None,
        }
    }

    pub fn with_wait_after_load(mut self, ms: u64) -> Self {
        self.wait_after_load_ms = ms;
        self
    }

    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn wait_after_load(&self) -> Duration {
        Duration::from_millis(self.wait_after_load_ms)
    }

    /// Caller headers, if any were supplied and non-empty.
    pub fn extra_headers(&self) -> Option<&HashMap<String, String>> {
        self.headers.as_ref().filter(|h| !h.is_empty())
    }
}

/// The single result produced for a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub content: String,
    pub page_status_code: u16,
    pub page_error: String,
}

impl FetchResult {
    /// Build a result from captured content, deriving `page_error` from the status.
    pub fn from_page(content: String, status: u16) -> Self {
        Self {
            content,
            page_status_code: status,
            page_error: describe_status(status).to_string(),
        }
    }

    /// Degraded result for a strategy that failed outright.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            page_status_code: INTERNAL_ERROR_STATUS,
            page_error: message.into(),
        }
    }
}
