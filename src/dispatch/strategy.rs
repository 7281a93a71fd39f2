//! Fetch strategies and their typed outcomes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::{PageRenderer, RemoteSessionClient};
use crate::error::{GatewayError, GatewayResult};
use crate::extract::CommentThreadExtractor;
use crate::models::{FetchRequest, FetchResult};
use crate::proxy_scrape::ProxyScrapeClient;

/// Registry key for a retrieval method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Local headless browser.
    DirectRender,
    /// Remote hardened session, direct traffic.
    RemoteSession,
    /// Remote hardened session through proxies, with comment-thread extraction.
    CommentThread,
    /// Third-party scraping API.
    ProxyScrape,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectRender => write!(f, "direct render"),
            Self::RemoteSession => write!(f, "remote session"),
            Self::CommentThread => write!(f, "comment thread session"),
            Self::ProxyScrape => write!(f, "proxy scrape"),
        }
    }
}

/// Outcome of a single strategy attempt.
#[derive(Debug)]
pub enum Attempt {
    /// The page was fetched; its status may still be an HTTP error.
    Fetched(FetchResult),
    /// Timeout, DNS or connection failure while navigating.
    NavigationFailed(String),
    /// Any other failure of the strategy itself.
    Failed(GatewayError),
}

impl From<GatewayResult<FetchResult>> for Attempt {
    fn from(result: GatewayResult<FetchResult>) -> Self {
        match result {
            Ok(page) => Attempt::Fetched(page),
            Err(GatewayError::NavigationFailure(msg)) => Attempt::NavigationFailed(msg),
            Err(e) => Attempt::Failed(e),
        }
    }
}

/// One way of turning a request into a result.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    async fn attempt(&self, request: &FetchRequest) -> Attempt;
}

#[async_trait]
impl FetchStrategy for PageRenderer {
    async fn attempt(&self, request: &FetchRequest) -> Attempt {
        self.fetch(request).await.into()
    }
}

#[async_trait]
impl FetchStrategy for RemoteSessionClient {
    async fn attempt(&self, request: &FetchRequest) -> Attempt {
        self.fetch(request, false).await.into()
    }
}

/// Lower bound on navigation for comment threads. Proxied thread pages are
/// slow to reach `load`; the comment marker wait gates content instead.
pub const THREAD_NAVIGATION_MIN_MS: u64 = 60_000;

/// Remote session with proxying, extracting comment threads.
pub struct CommentThreadStrategy {
    client: Arc<RemoteSessionClient>,
    extractor: CommentThreadExtractor,
}

impl CommentThreadStrategy {
    pub fn new(client: Arc<RemoteSessionClient>) -> Self {
        Self {
            client,
            extractor: CommentThreadExtractor::default(),
        }
    }

    /// The request with its navigation bound raised to the thread minimum.
    fn thread_request(request: &FetchRequest) -> FetchRequest {
        let timeout = request.timeout_ms.max(THREAD_NAVIGATION_MIN_MS);
        request.clone().with_timeout(timeout)
    }
}

#[async_trait]
impl FetchStrategy for CommentThreadStrategy {
    async fn attempt(&self, request: &FetchRequest) -> Attempt {
        let request = Self::thread_request(request);
        self.client
            .fetch_with(&request, true, &self.extractor)
            .await
            .into()
    }
}

#[async_trait]
impl FetchStrategy for ProxyScrapeClient {
    async fn attempt(&self, request: &FetchRequest) -> Attempt {
        match self.scrape(&request.url).await {
            Ok(content) => Attempt::Fetched(FetchResult::from_page(content, 200)),
            Err(e) => Attempt::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_failures_are_tagged() {
        let attempt: Attempt =
            Err::<FetchResult, _>(GatewayError::NavigationFailure("timeout".into())).into();
        assert!(matches!(attempt, Attempt::NavigationFailed(m) if m == "timeout"));
    }

    #[test]
    fn other_errors_are_failures() {
        let attempt: Attempt = Err::<FetchResult, _>(GatewayError::Browser("crash".into())).into();
        assert!(matches!(attempt, Attempt::Failed(GatewayError::Browser(_))));
    }

    #[test]
    fn thread_navigation_gets_the_longer_bound() {
        let request = FetchRequest::new("https://reddit.com/r/x/comments/1").with_header("A", "b");
        let widened = CommentThreadStrategy::thread_request(&request);
        assert_eq!(widened.timeout_ms, THREAD_NAVIGATION_MIN_MS);
        assert_eq!(widened.url, request.url);
        assert_eq!(widened.headers, request.headers);

        let patient = request.with_timeout(90_000);
        assert_eq!(CommentThreadStrategy::thread_request(&patient).timeout_ms, 90_000);
    }

    #[test]
    fn error_pages_are_still_fetched() {
        let attempt: Attempt = Ok(FetchResult::from_page("nope".into(), 404)).into();
        assert!(matches!(attempt, Attempt::Fetched(r) if r.page_status_code == 404));
    }
}
