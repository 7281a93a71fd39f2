//! Content extraction from a rendered page.
//!
//! An extractor runs after navigation (and any challenge wait) and turns the
//! page into the `content` of a fetch result. [`RenderedHtml`] returns the
//! serialized DOM; [`thread::CommentThreadExtractor`] produces the formatted
//! comment-thread text.

pub mod thread;

pub use thread::{CommentThreadExtractor, ThreadComment, ThreadPost};

use async_trait::async_trait;
use chromiumoxide::Page;

use crate::browser::settle;
use crate::error::GatewayResult;
use crate::models::FetchRequest;

/// Turns a navigated page into response content.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, page: &Page, request: &FetchRequest) -> GatewayResult<String>;
}

/// Honors `wait_after_load`, then captures the rendered HTML.
pub struct RenderedHtml;

#[async_trait]
impl PageExtractor for RenderedHtml {
    async fn extract(&self, page: &Page, request: &FetchRequest) -> GatewayResult<String> {
        settle(request.wait_after_load()).await;
        Ok(page.content().await?)
    }
}
