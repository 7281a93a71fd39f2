//! Remote anti-bot browser sessions.
//!
//! Each request opens its own CDP connection to the session provider and
//! reuses the page the provider already created. The connection is closed
//! before the result is returned, and in the background if the request is
//! dropped first.

use std::future::Future;
use std::time::{Duration, Instant};

use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::config::RemoteSessionConfig;
use super::page::{apply_headers, navigate};
use super::release::{AbortOnDrop, ReleaseGuard};
use crate::error::{GatewayError, GatewayResult};
use crate::extract::{PageExtractor, RenderedHtml};
use crate::models::{FetchRequest, FetchResult};

/// Client for an externally hosted, anti-bot hardened browser.
#[derive(Debug, Clone)]
pub struct RemoteSessionClient {
    config: RemoteSessionConfig,
}

/// An open remote connection and the page used for this request.
///
/// Dropping it without calling [`RemoteSession::close`] still closes the
/// session, in the background.
struct RemoteSession {
    page: Page,
    release: ReleaseGuard,
}

impl RemoteSession {
    fn new(mut browser: Browser, page: Page, handler: AbortOnDrop) -> Self {
        let session_page = page.clone();
        let release = ReleaseGuard::new("remote session", async move {
            if let Err(e) = session_page.close().await {
                debug!("Remote page close failed: {}", e);
            }
            if let Err(e) = browser.close().await {
                debug!("Remote session close failed: {}", e);
            }
            drop(handler);
        });
        Self { page, release }
    }

    async fn close(self) {
        self.release.release().await;
    }
}

impl RemoteSessionClient {
    pub fn new(config: RemoteSessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RemoteSessionConfig {
        &self.config
    }

    /// Fetch rendered HTML through a remote session.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        enable_proxy: bool,
    ) -> GatewayResult<FetchResult> {
        self.fetch_with(request, enable_proxy, &RenderedHtml).await
    }

    /// Fetch through a remote session, producing content with `extractor`.
    pub async fn fetch_with(
        &self,
        request: &FetchRequest,
        enable_proxy: bool,
        extractor: &dyn PageExtractor,
    ) -> GatewayResult<FetchResult> {
        let session = self.connect(enable_proxy).await?;
        let result = self.run(&session.page, request, extractor).await;
        session.close().await;
        result
    }

    async fn connect(&self, enable_proxy: bool) -> GatewayResult<RemoteSession> {
        if self.config.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(GatewayError::Config(
                "remote session API key is not configured".to_string(),
            ));
        }

        info!(
            "Connecting to remote browser at {} (proxy={})",
            self.config.connect_url, enable_proxy
        );

        let handler_config = HandlerConfig {
            request_timeout: Duration::from_secs(self.config.request_timeout_secs),
            ..Default::default()
        };

        let (mut browser, mut handler) =
            Browser::connect_with_config(self.config.session_url(enable_proxy), handler_config)
                .await
                .map_err(|e| {
                    GatewayError::Browser(format!("Failed to connect to remote browser: {}", e))
                })?;

        let handler = AbortOnDrop::new(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        }));

        match existing_page(&mut browser).await {
            Ok(page) => Ok(RemoteSession::new(browser, page, handler)),
            Err(e) => {
                let _ = browser.close().await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        page: &Page,
        request: &FetchRequest,
        extractor: &dyn PageExtractor,
    ) -> GatewayResult<FetchResult> {
        apply_headers(page, request.extra_headers()).await?;

        let first_status = navigate(page, &request.url, request.timeout()).await?;

        let poll = Duration::from_millis(self.config.challenge_poll_ms);
        let max_wait = Duration::from_secs(self.config.challenge_max_wait_secs);
        let current_title = move || async move { page.get_title().await.ok().flatten() };

        let status =
            match wait_out_challenge(current_title, &self.config.challenge_titles, poll, max_wait)
                .await
            {
                Ok(waited) if !waited.is_zero() => {
                    info!("Challenge cleared after {}ms", waited.as_millis());
                    let latest = document_status(page, request.timeout()).await;
                    status_after_challenge(first_status, waited, latest)
                }
                Ok(_) => first_status,
                Err(e) => {
                    warn!("{}, capturing content anyway", e);
                    first_status
                }
            };

        let content = extractor.extract(page, request).await?;
        Ok(FetchResult::from_page(content, status))
    }
}

/// The provider's default page, or a new one if the session exposes none.
async fn existing_page(browser: &mut Browser) -> GatewayResult<Page> {
    browser.fetch_targets().await?;
    let pages = browser.pages().await?;
    match pages.into_iter().next() {
        Some(page) => Ok(page),
        None => {
            debug!("Remote session has no page, opening one");
            Ok(browser.new_page("about:blank").await?)
        }
    }
}

/// Reads the HTTP status of the document currently shown.
const DOCUMENT_STATUS_SCRIPT: &str = "(() => { \
    const nav = performance.getEntriesByType('navigation')[0]; \
    return nav && nav.responseStatus ? nav.responseStatus : null; \
})()";

/// HTTP status of the page's current document, if the browser reports one.
async fn document_status(page: &Page, timeout: Duration) -> Option<u16> {
    let evaluated = tokio::time::timeout(timeout, page.evaluate(DOCUMENT_STATUS_SCRIPT.to_string()))
        .await
        .ok()?
        .ok()?;
    evaluated.into_value::<Option<u16>>().ok().flatten()
}

/// Status to report once a challenge page has been waited out.
///
/// A different status read after the wait belongs to the document that
/// replaced the challenge and wins. If nothing new can be read, the
/// challenge's own error status is stale: the title cleared, so the content
/// being captured is the real page and is reported as 200.
pub fn status_after_challenge(first: u16, waited: Duration, latest: Option<u16>) -> u16 {
    if waited.is_zero() {
        return first;
    }
    match latest {
        Some(status) if status != first => status,
        _ if first >= 400 => 200,
        _ => first,
    }
}

/// Wait while the page title is a known challenge title.
///
/// Returns how long was spent waiting (zero when no challenge was shown), or
/// [`GatewayError::ChallengeTimeout`] if the challenge never cleared.
pub async fn wait_out_challenge<F, Fut>(
    mut current_title: F,
    challenge_titles: &[String],
    poll: Duration,
    max_wait: Duration,
) -> GatewayResult<Duration>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<String>>,
{
    let is_challenge = |title: &Option<String>| {
        title
            .as_deref()
            .map(str::trim)
            .is_some_and(|t| challenge_titles.iter().any(|c| c == t))
    };

    let start = Instant::now();
    if !is_challenge(&current_title().await) {
        return Ok(Duration::ZERO);
    }
    info!(
        "Challenge page detected, waiting up to {}s",
        max_wait.as_secs()
    );

    loop {
        let elapsed = start.elapsed();
        if elapsed >= max_wait {
            return Err(GatewayError::ChallengeTimeout(max_wait.as_secs()));
        }
        tokio::time::sleep(poll.min(max_wait - elapsed)).await;
        if !is_challenge(&current_title().await) {
            return Ok(start.elapsed());
        }
    }
}
