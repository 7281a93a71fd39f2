//! Fetch-strategy dispatcher.
//!
//! Routes a request to a strategy based on its host class and applies the
//! fallback policy:
//!
//! - comment-thread, hardened and structured-proxy hosts go straight to their
//!   specialized strategy, with no fallback;
//! - social permalinks are rewritten to their syndication URL first;
//! - everything else is rendered locally, and a 403 or a render failure is
//!   retried exactly once on a remote hardened session.

mod strategy;

pub use strategy::{Attempt, CommentThreadStrategy, FetchStrategy, StrategyKind};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::browser::{PageRenderer, RemoteSessionClient};
use crate::classify::{parse_target, rewrite_permalink, DomainClass, SiteTable};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{FetchRequest, FetchResult};
use crate::proxy_scrape::ProxyScrapeClient;

/// Status that sends a direct render to the fallback strategy.
pub const ESCALATION_STATUS: u16 = 403;

/// Strategy chain for one domain class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub primary: StrategyKind,
    pub fallback: Option<StrategyKind>,
}

/// Route table. Permalinks use the default route after rewriting.
pub fn route_for(class: DomainClass) -> Route {
    match class {
        DomainClass::Default | DomainClass::SocialPermalink => Route {
            primary: StrategyKind::DirectRender,
            fallback: Some(StrategyKind::RemoteSession),
        },
        DomainClass::CommentThreadSite => Route {
            primary: StrategyKind::CommentThread,
            fallback: None,
        },
        DomainClass::HardenedSite => Route {
            primary: StrategyKind::RemoteSession,
            fallback: None,
        },
        DomainClass::StructuredProxySite => Route {
            primary: StrategyKind::ProxyScrape,
            fallback: None,
        },
    }
}

/// Why a primary attempt should be retried on the fallback, if it should.
fn fallback_reason(attempt: &Attempt) -> Option<String> {
    match attempt {
        Attempt::Fetched(page) if page.page_status_code == ESCALATION_STATUS => {
            Some(format!("status {}", ESCALATION_STATUS))
        }
        Attempt::Fetched(_) => None,
        Attempt::NavigationFailed(msg) => Some(msg.clone()),
        Attempt::Failed(GatewayError::InvalidInput(_)) => None,
        Attempt::Failed(e) => Some(e.to_string()),
    }
}

/// Turn the final attempt into the caller-visible outcome.
fn conclude(kind: StrategyKind, attempt: Attempt) -> GatewayResult<FetchResult> {
    match attempt {
        Attempt::Fetched(page) => Ok(page),
        Attempt::Failed(e @ (GatewayError::InvalidInput(_) | GatewayError::Upstream { .. })) => {
            Err(e)
        }
        Attempt::NavigationFailed(msg) => {
            warn!("{} failed: {}", kind, msg);
            Ok(FetchResult::internal_error(format!(
                "An error occurred with {}: {}",
                kind, msg
            )))
        }
        Attempt::Failed(e) => {
            warn!("{} failed: {}", kind, e);
            Ok(FetchResult::internal_error(format!(
                "An error occurred with {}: {}",
                kind, e
            )))
        }
    }
}

/// Classifies requests and runs them through the registered strategies.
#[derive(Clone)]
pub struct Dispatcher {
    sites: SiteTable,
    strategies: HashMap<StrategyKind, Arc<dyn FetchStrategy>>,
}

impl Dispatcher {
    /// A dispatcher with no strategies registered.
    pub fn new(sites: SiteTable) -> Self {
        Self {
            sites,
            strategies: HashMap::new(),
        }
    }

    /// Register the production strategies. Without a local renderer, default
    /// hosts go straight to the remote session fallback.
    pub fn standard(
        sites: SiteTable,
        renderer: Option<PageRenderer>,
        remote: Arc<RemoteSessionClient>,
        proxy: ProxyScrapeClient,
    ) -> Self {
        let mut dispatcher = Self::new(sites)
            .with_strategy(StrategyKind::RemoteSession, remote.clone())
            .with_strategy(
                StrategyKind::CommentThread,
                Arc::new(CommentThreadStrategy::new(remote)),
            )
            .with_strategy(StrategyKind::ProxyScrape, Arc::new(proxy));
        if let Some(renderer) = renderer {
            dispatcher = dispatcher.with_strategy(StrategyKind::DirectRender, Arc::new(renderer));
        }
        dispatcher
    }

    pub fn with_strategy(mut self, kind: StrategyKind, strategy: Arc<dyn FetchStrategy>) -> Self {
        self.strategies.insert(kind, strategy);
        self
    }

    pub fn sites(&self) -> &SiteTable {
        &self.sites
    }

    /// Fetch a URL.
    ///
    /// Returns `Err` only for malformed input and proxy-scrape upstream
    /// failures; every other failure becomes a 500 [`FetchResult`].
    pub async fn handle(&self, mut request: FetchRequest) -> GatewayResult<FetchResult> {
        if request.timeout_ms == 0 {
            return Err(GatewayError::InvalidInput(
                "timeout must be greater than zero".to_string(),
            ));
        }

        let (url, host) = parse_target(&request.url)?;
        let class = self.sites.classify(&host);

        let span = info_span!(
            "fetch",
            request_id = %Uuid::new_v4(),
            host = %host,
            class = %class
        );

        async move {
            if class == DomainClass::SocialPermalink {
                let rewritten = rewrite_permalink(&url)?;
                info!("Rewrote permalink to {}", rewritten);
                request.url = rewritten;
            }
            self.run_route(route_for(class), &request).await
        }
        .instrument(span)
        .await
    }

    async fn run_route(&self, route: Route, request: &FetchRequest) -> GatewayResult<FetchResult> {
        let first = self.attempt(route.primary, request).await;

        let Some(fallback) = route.fallback else {
            return conclude(route.primary, first);
        };
        let Some(reason) = fallback_reason(&first) else {
            return conclude(route.primary, first);
        };

        info!("{} gave {}, retrying with {}", route.primary, reason, fallback);
        let second = self.attempt(fallback, request).await;
        conclude(fallback, second)
    }

    async fn attempt(&self, kind: StrategyKind, request: &FetchRequest) -> Attempt {
        match self.strategies.get(&kind) {
            Some(strategy) => {
                debug!("Attempting {} for {}", kind, request.url);
                strategy.attempt(request).await
            }
            None => Attempt::Failed(GatewayError::Config(format!(
                "no strategy registered for {}",
                kind
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Outcome = Box<dyn Fn() -> Attempt + Send + Sync>;

    /// Strategy that records the URLs it saw and replays a fixed outcome.
    struct Scripted {
        seen: Mutex<Vec<String>>,
        outcome: Outcome,
    }

    impl Scripted {
        fn new(outcome: impl Fn() -> Attempt + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                outcome: Box::new(outcome),
            })
        }

        fn page(content: &'static str, status: u16) -> Arc<Self> {
            Self::new(move || Attempt::Fetched(FetchResult::from_page(content.to_string(), status)))
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn urls(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FetchStrategy for Scripted {
        async fn attempt(&self, request: &FetchRequest) -> Attempt {
            self.seen.lock().unwrap().push(request.url.clone());
            (self.outcome)()
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        render: Arc<Scripted>,
        remote: Arc<Scripted>,
        thread: Arc<Scripted>,
        proxy: Arc<Scripted>,
    }

    fn harness(render: Arc<Scripted>, remote: Arc<Scripted>) -> Harness {
        harness_with(render, remote, Scripted::page("thread", 200), Scripted::page("proxied", 200))
    }

    fn harness_with(
        render: Arc<Scripted>,
        remote: Arc<Scripted>,
        thread: Arc<Scripted>,
        proxy: Arc<Scripted>,
    ) -> Harness {
        let mut sites = SiteTable::default();
        sites.hardened = vec!["hardened.test".to_string()];
        sites.structured_proxy = vec!["proxied.test".to_string()];

        let dispatcher = Dispatcher::new(sites)
            .with_strategy(StrategyKind::DirectRender, render.clone())
            .with_strategy(StrategyKind::RemoteSession, remote.clone())
            .with_strategy(StrategyKind::CommentThread, thread.clone())
            .with_strategy(StrategyKind::ProxyScrape, proxy.clone());

        Harness {
            dispatcher,
            render,
            remote,
            thread,
            proxy,
        }
    }

    #[tokio::test]
    async fn plain_page_is_returned_verbatim() {
        let h = harness(
            Scripted::page("<html>...</html>", 200),
            Scripted::page("remote", 200),
        );
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://example.com").with_timeout(15_000))
            .await
            .unwrap();

        assert_eq!(
            result,
            FetchResult {
                content: "<html>...</html>".to_string(),
                page_status_code: 200,
                page_error: String::new(),
            }
        );
        assert_eq!(h.remote.calls(), 0);
    }

    #[tokio::test]
    async fn forbidden_falls_back_exactly_once() {
        let h = harness(
            Scripted::page("blocked", 403),
            Scripted::page("<html>real</html>", 200),
        );
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://example.com/item"))
            .await
            .unwrap();

        assert_eq!(result.content, "<html>real</html>");
        assert_eq!(result.page_status_code, 200);
        assert_eq!(h.render.calls(), 1);
        assert_eq!(h.remote.calls(), 1);
    }

    #[tokio::test]
    async fn fallback_result_is_final_even_if_also_forbidden() {
        let h = harness(Scripted::page("blocked", 403), Scripted::page("still blocked", 403));
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://example.com"))
            .await
            .unwrap();

        assert_eq!(result.content, "still blocked");
        assert_eq!(result.page_error, "Forbidden");
        assert_eq!(h.remote.calls(), 1);
    }

    #[tokio::test]
    async fn other_error_statuses_pass_through() {
        for status in [404, 500, 429] {
            let h = harness(Scripted::page("err", status), Scripted::page("remote", 200));
            let result = h
                .dispatcher
                .handle(FetchRequest::new("https://example.com/missing"))
                .await
                .unwrap();

            assert_eq!(result.page_status_code, status);
            assert_eq!(result.page_error, crate::status::describe_status(status));
            assert_eq!(h.remote.calls(), 0, "no fallback for {}", status);
        }
    }

    #[tokio::test]
    async fn render_failure_falls_back() {
        let h = harness(
            Scripted::new(|| Attempt::NavigationFailed("timed out".to_string())),
            Scripted::page("rescued", 200),
        );
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://slow.example.com"))
            .await
            .unwrap();

        assert_eq!(result.content, "rescued");
        assert_eq!(h.remote.calls(), 1);
    }

    #[tokio::test]
    async fn crashed_renderer_falls_back() {
        let h = harness(
            Scripted::new(|| Attempt::Failed(GatewayError::Browser("target crashed".to_string()))),
            Scripted::page("rescued", 200),
        );
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://example.com"))
            .await
            .unwrap();
        assert_eq!(result.content, "rescued");
    }

    #[tokio::test]
    async fn failed_fallback_becomes_internal_error() {
        let h = harness(
            Scripted::new(|| Attempt::NavigationFailed("timed out".to_string())),
            Scripted::new(|| Attempt::Failed(GatewayError::Browser("session refused".to_string()))),
        );
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://example.com"))
            .await
            .unwrap();

        assert_eq!(result.page_status_code, 500);
        assert!(result.page_error.contains("remote session"));
        assert!(result.page_error.contains("session refused"));
        assert_eq!(h.render.calls(), 1);
        assert_eq!(h.remote.calls(), 1);
    }

    #[tokio::test]
    async fn hardened_hosts_skip_the_renderer() {
        let h = harness(Scripted::page("local", 200), Scripted::page("hardened", 200));
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://www.hardened.test/listing"))
            .await
            .unwrap();

        assert_eq!(result.content, "hardened");
        assert_eq!(h.render.calls(), 0);
        assert_eq!(h.remote.calls(), 1);
    }

    #[tokio::test]
    async fn hardened_failure_has_no_further_fallback() {
        let h = harness(
            Scripted::page("local", 200),
            Scripted::new(|| Attempt::NavigationFailed("timed out".to_string())),
        );
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://hardened.test"))
            .await
            .unwrap();

        assert_eq!(result.page_status_code, 500);
        assert_eq!(h.render.calls(), 0);
        assert_eq!(h.remote.calls(), 1);
    }

    #[tokio::test]
    async fn hardened_forbidden_is_returned_as_is() {
        let h = harness(Scripted::page("local", 200), Scripted::page("denied", 403));
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://hardened.test"))
            .await
            .unwrap();
        assert_eq!(result.page_status_code, 403);
        assert_eq!(h.remote.calls(), 1);
    }

    #[tokio::test]
    async fn proxy_hosts_use_only_the_proxy_client() {
        let h = harness(Scripted::page("local", 200), Scripted::page("remote", 200));
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://proxied.test/profile"))
            .await
            .unwrap();

        assert_eq!(result.content, "proxied");
        assert_eq!(result.page_status_code, 200);
        assert_eq!(h.proxy.calls(), 1);
        assert_eq!(h.render.calls(), 0);
        assert_eq!(h.remote.calls(), 0);
    }

    #[tokio::test]
    async fn proxy_upstream_errors_reach_the_caller() {
        let h = harness_with(
            Scripted::page("local", 200),
            Scripted::page("remote", 200),
            Scripted::page("thread", 200),
            Scripted::new(|| {
                Attempt::Failed(GatewayError::Upstream {
                    status: 401,
                    message: "bad key".to_string(),
                })
            }),
        );
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://proxied.test"))
            .await;

        assert!(matches!(result, Err(GatewayError::Upstream { status: 401, .. })));
        assert_eq!(h.render.calls(), 0);
        assert_eq!(h.remote.calls(), 0);
    }

    #[tokio::test]
    async fn comment_threads_use_the_thread_strategy() {
        let h = harness(Scripted::page("local", 200), Scripted::page("remote", 200));
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://www.reddit.com/r/rust/comments/abc/title/"))
            .await
            .unwrap();

        assert_eq!(result.content, "thread");
        assert_eq!(h.thread.calls(), 1);
        assert_eq!(h.render.calls(), 0);
        assert_eq!(h.remote.calls(), 0);
    }

    #[tokio::test]
    async fn comment_thread_failure_is_not_retried() {
        let h = harness_with(
            Scripted::page("local", 200),
            Scripted::page("remote", 200),
            Scripted::new(|| Attempt::Failed(GatewayError::Browser("proxy down".to_string()))),
            Scripted::page("proxied", 200),
        );
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://reddit.com/r/x/comments/1"))
            .await
            .unwrap();

        assert_eq!(result.page_status_code, 500);
        assert_eq!(h.thread.calls(), 1);
        assert_eq!(h.remote.calls(), 0);
        assert_eq!(h.render.calls(), 0);
    }

    #[tokio::test]
    async fn permalinks_are_rewritten_before_rendering() {
        let h = harness(Scripted::page("{}", 200), Scripted::page("remote", 200));
        h.dispatcher
            .handle(FetchRequest::new("https://x.com/someone/status/1780000000000000000"))
            .await
            .unwrap();

        assert_eq!(
            h.render.urls(),
            vec!["https://cdn.syndication.twimg.com/tweet-result?id=1780000000000000000&lang=en"]
        );
    }

    #[tokio::test]
    async fn rewritten_permalink_still_falls_back_on_forbidden() {
        let h = harness(Scripted::page("blocked", 403), Scripted::page("{}", 200));
        h.dispatcher
            .handle(FetchRequest::new("https://twitter.com/a/status/7"))
            .await
            .unwrap();

        assert_eq!(h.remote.calls(), 1);
        assert!(h.remote.urls()[0].starts_with("https://cdn.syndication.twimg.com/"));
    }

    #[tokio::test]
    async fn permalink_without_id_is_rejected() {
        let h = harness(Scripted::page("local", 200), Scripted::page("remote", 200));
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://x.com/someone"))
            .await;

        assert!(matches!(result, Err(GatewayError::InvalidInput(_))));
        assert_eq!(h.render.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_urls_are_rejected() {
        let h = harness(Scripted::page("local", 200), Scripted::page("remote", 200));
        for bad in ["not a url", "", "mailto:someone@example.com"] {
            let result = h.dispatcher.handle(FetchRequest::new(bad)).await;
            assert!(matches!(result, Err(GatewayError::InvalidInput(_))), "{:?}", bad);
        }
        assert_eq!(h.render.calls(), 0);
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let h = harness(Scripted::page("local", 200), Scripted::page("remote", 200));
        let result = h
            .dispatcher
            .handle(FetchRequest::new("https://example.com").with_timeout(0))
            .await;
        assert!(matches!(result, Err(GatewayError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn missing_strategy_degrades_to_internal_error() {
        let dispatcher = Dispatcher::new(SiteTable::empty());
        let result = dispatcher
            .handle(FetchRequest::new("https://example.com"))
            .await
            .unwrap();
        assert_eq!(result.page_status_code, 500);
        assert!(result.page_error.contains("no strategy registered"));
    }

    #[test]
    fn specialized_routes_have_no_fallback() {
        for class in [
            DomainClass::CommentThreadSite,
            DomainClass::HardenedSite,
            DomainClass::StructuredProxySite,
        ] {
            assert_eq!(route_for(class).fallback, None, "{}", class);
        }
        assert_eq!(
            route_for(DomainClass::Default).fallback,
            Some(StrategyKind::RemoteSession)
        );
    }
}
