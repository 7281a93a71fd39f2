//! HTTP front end for the fetch gateway.
//!
//! Exposes `POST /html` plus liveness and readiness checks. The local
//! browser is launched when the server starts and closed after it stops.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::browser::{BrowserHandle, PageRenderer, RemoteSessionClient};
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::proxy_scrape::ProxyScrapeClient;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Local browser, `None` if it could not be launched.
    pub browser: Option<Arc<BrowserHandle>>,
}

impl AppState {
    /// Launch the local browser and wire up every strategy.
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let browser = match BrowserHandle::launch(settings.browser.clone()).await {
            Ok(handle) => Some(Arc::new(handle)),
            Err(e) => {
                warn!("Local browser unavailable, direct renders disabled: {}", e);
                None
            }
        };

        let dispatcher = Dispatcher::standard(
            settings.sites.clone(),
            browser.clone().map(PageRenderer::new),
            Arc::new(RemoteSessionClient::new(settings.remote.clone())),
            ProxyScrapeClient::new(settings.proxy.clone())?,
        );

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            browser,
        })
    }

    /// Close the local browser, if one was launched.
    pub async fn shutdown(&self) {
        if let Some(browser) = &self.browser {
            browser.close().await;
        }
    }
}

/// Start the web server and run until Ctrl+C.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings).await?;
    let app = create_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    state.shutdown().await;
    served?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::classify::SiteTable;
    use crate::dispatch::{Attempt, FetchStrategy, StrategyKind};
    use crate::error::GatewayError;
    use crate::models::{FetchRequest, FetchResult};

    struct EchoPage;

    #[async_trait]
    impl FetchStrategy for EchoPage {
        async fn attempt(&self, request: &FetchRequest) -> Attempt {
            let status = if request.url.contains("missing") { 404 } else { 200 };
            Attempt::Fetched(FetchResult::from_page(
                format!("<html>{}</html>", request.url),
                status,
            ))
        }
    }

    struct BrokenProxy;

    #[async_trait]
    impl FetchStrategy for BrokenProxy {
        async fn attempt(&self, _request: &FetchRequest) -> Attempt {
            Attempt::Failed(GatewayError::Upstream {
                status: 500,
                message: "provider down".to_string(),
            })
        }
    }

    fn setup_test_app() -> axum::Router {
        let dispatcher = Dispatcher::new(SiteTable::default())
            .with_strategy(StrategyKind::DirectRender, Arc::new(EchoPage))
            .with_strategy(StrategyKind::ProxyScrape, Arc::new(BrokenProxy));

        create_router(AppState {
            dispatcher: Arc::new(dispatcher),
            browser: None,
        })
    }

    fn post_html(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/html")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_html() {
        let app = setup_test_app();

        let response = app
            .oneshot(post_html(serde_json::json!({
                "url": "https://example.com",
                "wait_after_load": 0,
                "timeout": 15000
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["content"], "<html>https://example.com</html>");
        assert_eq!(json["pageStatusCode"], 200);
        assert_eq!(json["pageError"], "");
    }

    #[tokio::test]
    async fn test_fetch_html_page_error_is_not_http_error() {
        let app = setup_test_app();

        let response = app
            .oneshot(post_html(serde_json::json!({ "url": "https://example.com/missing" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["pageStatusCode"], 404);
        assert_eq!(json["pageError"], "Not Found");
    }

    #[tokio::test]
    async fn test_fetch_html_invalid_url() {
        let app = setup_test_app();

        let response = app
            .oneshot(post_html(serde_json::json!({ "url": "not a url" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("Invalid input"));
    }

    #[tokio::test]
    async fn test_fetch_html_upstream_failure() {
        let app = setup_test_app();

        let response = app
            .oneshot(post_html(serde_json::json!({ "url": "https://www.linkedin.com/in/x" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("provider down"));
    }

    #[tokio::test]
    async fn test_liveness() {
        let app = setup_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/liveness")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_readiness_without_browser() {
        let app = setup_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/readiness")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "Service Unavailable");
    }
}
