//! fetchgate - web-scraping gateway.
//!
//! Given a URL, returns rendered HTML (or extracted thread text) by routing
//! the request to a local headless browser, a remote anti-bot browser
//! session, or a third-party scraping API, with fallback when a direct
//! render is blocked or fails.

pub mod browser;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod models;
pub mod proxy_scrape;
pub mod server;
pub mod status;

pub use dispatch::Dispatcher;
pub use error::{GatewayError, GatewayResult};
pub use models::{FetchRequest, FetchResult};
