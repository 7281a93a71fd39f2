//! Runtime settings.
//!
//! Values come from CLI flags, falling back to the environment (after `.env`
//! has been loaded). The site table is compiled in unless a TOML file
//! replaces it.

use std::path::PathBuf;

use clap::Args;

use crate::browser::{BrowserConfig, RemoteSessionConfig};
use crate::classify::SiteTable;
use crate::error::GatewayResult;
use crate::proxy_scrape::{ProxyScrapeConfig, DEFAULT_ENDPOINT};

/// Flags shared by every command that dispatches fetches.
#[derive(Debug, Clone, Args)]
pub struct SettingsArgs {
    /// API key for the remote browser session provider
    #[arg(long, env = "BROWSERBASE_API_KEY", hide_env_values = true)]
    pub browserbase_api_key: Option<String>,

    /// Remote browser session websocket endpoint
    #[arg(
        long,
        env = "BROWSERBASE_CONNECT_URL",
        default_value = "wss://connect.browserbase.com"
    )]
    pub browserbase_connect_url: String,

    /// API key for the proxy scraping service
    #[arg(long, env = "PROXY_SCRAPE_API_KEY", hide_env_values = true)]
    pub proxy_scrape_api_key: Option<String>,

    /// Proxy scraping service endpoint
    #[arg(long, env = "PROXY_SCRAPE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub proxy_scrape_endpoint: String,

    /// Block images, audio and video in direct renders
    #[arg(long, env = "BLOCK_MEDIA")]
    pub block_media: bool,

    /// TOML file replacing the built-in site table
    #[arg(long, env = "FETCHGATE_SITES")]
    pub sites: Option<PathBuf>,

    /// Chrome/Chromium executable (auto-detected if unset)
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Run the local browser headless
    #[arg(long, env = "HEADLESS", default_value_t = true, action = clap::ArgAction::Set)]
    pub headless: bool,
}

/// Fully resolved configuration for the gateway.
#[derive(Debug, Clone)]
pub struct Settings {
    pub browser: BrowserConfig,
    pub remote: RemoteSessionConfig,
    pub proxy: ProxyScrapeConfig,
    pub sites: SiteTable,
}

impl Settings {
    pub fn from_args(args: &SettingsArgs) -> GatewayResult<Self> {
        let sites = match &args.sites {
            Some(path) => SiteTable::from_toml_file(path)?,
            None => SiteTable::default(),
        };

        let browser = BrowserConfig {
            headless: args.headless,
            chrome_path: args.chrome_path.clone(),
            block_media: args.block_media,
            ..Default::default()
        };

        let remote = RemoteSessionConfig {
            connect_url: args.browserbase_connect_url.clone(),
            api_key: non_empty(&args.browserbase_api_key),
            challenge_titles: sites.challenge_titles.clone(),
            ..Default::default()
        };

        let proxy = ProxyScrapeConfig {
            endpoint: args.proxy_scrape_endpoint.clone(),
            api_key: non_empty(&args.proxy_scrape_api_key),
            ..Default::default()
        };

        Ok(Self {
            browser,
            remote,
            proxy,
            sites,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
