//! Comment-thread extraction (reddit-style `shreddit` markup).

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::Page;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::PageExtractor;
use crate::error::GatewayResult;
use crate::models::FetchRequest;

pub const TITLE_PLACEHOLDER: &str = "Title not found";
pub const BODY_PLACEHOLDER: &str = "No text body found";

/// Marker for a top-level comment.
const TOP_LEVEL_COMMENT: &str = r#"shreddit-comment[depth="0"]"#;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";

static COMMENT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(TOP_LEVEL_COMMENT).unwrap());
static COMMENT_BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".md").unwrap());
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"h1[slot="title"]"#).unwrap());
static POST_BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[slot="text-body"] .md"#).unwrap());

/// A top-level comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadComment {
    pub author: Option<String>,
    pub score: Option<String>,
    pub content: String,
}

/// Post title, body and its top-level comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPost {
    pub title: String,
    pub body: String,
    pub comments: Vec<ThreadComment>,
}

impl ThreadPost {
    /// Pull the post out of a rendered thread page.
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);

        let title = first_text(&document, &TITLE_SELECTOR)
            .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string());
        let body = first_text(&document, &POST_BODY_SELECTOR)
            .unwrap_or_else(|| BODY_PLACEHOLDER.to_string());

        let comments = document
            .select(&COMMENT_SELECTOR)
            .map(|comment| ThreadComment {
                author: comment.value().attr("author").map(str::to_string),
                score: comment.value().attr("score").map(str::to_string),
                content: comment
                    .select(&COMMENT_BODY_SELECTOR)
                    .next()
                    .map(|md| element_text(&md))
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            title,
            body,
            comments,
        }
    }

    /// Text form returned to callers.
    pub fn format(&self) -> String {
        let mut out = format!(
            "<title>{}</title>\n\n<body>{}</body>\n\n## Top Comments\n\n",
            self.title, self.body
        );
        for comment in &self.comments {
            out.push_str(&format!("<comment>{}</comment>\n\n", comment.content));
        }
        out
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Trimmed text of the first match, `None` when missing or blank.
fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|e| element_text(&e))
        .filter(|t| !t.is_empty())
}

/// Waits for comments, scrolls to trigger lazy loading, then extracts.
pub struct CommentThreadExtractor {
    pub marker_timeout: Duration,
    pub settle: Duration,
}

impl Default for CommentThreadExtractor {
    fn default() -> Self {
        Self {
            marker_timeout: Duration::from_secs(10),
            settle: Duration::from_secs(1),
        }
    }
}

impl CommentThreadExtractor {
    /// Poll for the top-level comment marker until it appears or the bound expires.
    async fn wait_for_marker(&self, page: &Page) -> bool {
        let start = Instant::now();
        loop {
            let remaining = self.marker_timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return false;
            }
            let found =
                tokio::time::timeout(remaining, page.find_element(TOP_LEVEL_COMMENT)).await;
            if let Ok(Ok(_)) = found {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(250).min(remaining)).await;
        }
    }
}

#[async_trait]
impl PageExtractor for CommentThreadExtractor {
    async fn extract(&self, page: &Page, _request: &FetchRequest) -> GatewayResult<String> {
        if self.wait_for_marker(page).await {
            debug!("Top-level comments present");
        } else {
            warn!(
                "No top-level comments after {}s, extracting what is there",
                self.marker_timeout.as_secs()
            );
        }

        page.evaluate(SCROLL_TO_BOTTOM.to_string()).await?;
        tokio::time::sleep(self.settle).await;

        let html = page.content().await?;
        let post = ThreadPost::parse(&html);
        debug!("Extracted {} top-level comments", post.comments.len());
        Ok(post.format())
    }
}
