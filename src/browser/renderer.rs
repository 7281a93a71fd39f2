//! Direct rendering on the shared local browser.

use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, Page};
use tracing::{debug, warn};

use super::config::MEDIA_BLOCK_PATTERNS;
use super::page::{apply_headers, block_urls, navigate};
use super::release::ReleaseGuard;
use super::BrowserHandle;
use crate::error::{GatewayError, GatewayResult};
use crate::extract::{PageExtractor, RenderedHtml};
use crate::models::{FetchRequest, FetchResult};

/// Renders pages in per-request browser contexts of one shared browser.
#[derive(Clone)]
pub struct PageRenderer {
    browser: Arc<BrowserHandle>,
}

impl PageRenderer {
    pub fn new(browser: Arc<BrowserHandle>) -> Self {
        Self { browser }
    }

    /// Render a URL. Navigation failures come back as
    /// [`GatewayError::NavigationFailure`]; HTTP error statuses do not.
    ///
    /// The browser context is disposed even if this future is dropped.
    pub async fn fetch(&self, request: &FetchRequest) -> GatewayResult<FetchResult> {
        let browser = self.browser.acquire().await?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id;
        debug!("Created browser context {:?}", context_id);

        let cleanup = ReleaseGuard::new(
            "browser context",
            dispose_context(self.browser.clone(), context_id.clone()),
        );

        let result = self.fetch_in_context(&browser, &context_id, request).await;

        // Disposal takes its own read lock
        drop(browser);
        cleanup.release().await;
        result
    }

    async fn fetch_in_context(
        &self,
        browser: &Browser,
        context_id: &BrowserContextId,
        request: &FetchRequest,
    ) -> GatewayResult<FetchResult> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(GatewayError::Browser)?;
        let page = browser.new_page(target).await?;

        let result = self.render(&page, request).await;
        let _ = page.close().await;
        result
    }

    async fn render(&self, page: &Page, request: &FetchRequest) -> GatewayResult<FetchResult> {
        if self.browser.config().block_media {
            block_urls(page, MEDIA_BLOCK_PATTERNS).await?;
        }
        apply_headers(page, request.extra_headers()).await?;

        let status = navigate(page, &request.url, request.timeout()).await?;
        let content = RenderedHtml.extract(page, request).await?;

        Ok(FetchResult::from_page(content, status))
    }
}

async fn dispose_context(browser: Arc<BrowserHandle>, context_id: BrowserContextId) {
    let browser = match browser.acquire().await {
        Ok(browser) => browser,
        // Contexts go away with the browser
        Err(_) => return,
    };
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        warn!("Failed to dispose browser context: {}", e);
    }
}
