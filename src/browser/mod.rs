//! Browser-based fetching.
//!
//! Uses chromiumoxide (CDP). A single local browser process is shared by all
//! requests through [`BrowserHandle`]; every request gets its own browser
//! context. Remote anti-bot sessions are opened per request.

mod config;
mod page;
mod release;
mod remote;
mod renderer;

pub use config::{BrowserConfig, RemoteSessionConfig, MEDIA_BLOCK_PATTERNS};
pub use page::settle;
pub use remote::{status_after_challenge, wait_out_challenge, RemoteSessionClient};
pub use renderer::PageRenderer;

use std::path::PathBuf;

use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};

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

/// Process-wide browser. Launched once at startup, closed once at shutdown.
pub struct BrowserHandle {
    browser: RwLock<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    config: BrowserConfig,
}

impl BrowserHandle {
    /// Launch the local browser process.
    pub async fn launch(config: BrowserConfig) -> GatewayResult<Self> {
        let chrome_path = match config.chrome_path.clone() {
            Some(path) => path,
            None => find_chrome()?,
        };
        info!(
            "Launching browser {} (headless={})",
            chrome_path.display(),
            config.headless
        );

        let mut builder = chromiumoxide::BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| GatewayError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;

        let task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler: Mutex::new(Some(task)),
            config,
        })
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// True while the browser process is up.
    pub async fn is_ready(&self) -> bool {
        self.browser.read().await.is_some()
    }

    /// Shared access to the running browser.
    pub(crate) async fn acquire(&self) -> GatewayResult<RwLockReadGuard<'_, Browser>> {
        let guard = self.browser.read().await;
        RwLockReadGuard::try_map(guard, |b| b.as_ref())
            .map_err(|_| GatewayError::Browser("browser is not running".to_string()))
    }

    /// Close the browser. Waits for in-flight requests to release it.
    pub async fn close(&self) {
        if let Some(mut browser) = self.browser.write().await.take() {
            info!("Closing browser");
            if let Err(e) = browser.close().await {
                warn!("Browser did not close cleanly: {}", e);
            }
        }
        if let Some(task) = self.handler.lock().await.take() {
            task.abort();
        }
    }
}

/// Find a Chrome executable in well-known locations or on PATH.
fn find_chrome() -> GatewayResult<PathBuf> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            debug!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            debug!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(GatewayError::Config(
        "Chrome/Chromium not found. Install it or set CHROME_PATH".to_string(),
    ))
}
