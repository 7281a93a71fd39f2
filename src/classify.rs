//! Domain classification and URL rewriting.
//!
//! Strategy selection is a pure function of the request host: the host is
//! matched case-insensitively against the domain lists of a [`SiteTable`],
//! either exactly or as a subdomain (`host == d || host.ends_with(".d")`).

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GatewayError, GatewayResult};

/// Public syndication endpoint that serves a status update by id.
pub const SYNDICATION_ENDPOINT: &str = "https://cdn.syndication.twimg.com/tweet-result";

static STATUS_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status(?:es)?/(\d+)").expect("valid status id regex"));

/// Class of a request host, decides which route the dispatcher takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainClass {
    Default,
    SocialPermalink,
    CommentThreadSite,
    HardenedSite,
    StructuredProxySite,
}

impl fmt::Display for DomainClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::SocialPermalink => write!(f, "social-permalink"),
            Self::CommentThreadSite => write!(f, "comment-thread"),
            Self::HardenedSite => write!(f, "hardened"),
            Self::StructuredProxySite => write!(f, "structured-proxy"),
        }
    }
}

/// Host pattern table. Each list holds bare domains (`"reddit.com"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTable {
    #[serde(default = "default_social_permalink")]
    pub social_permalink: Vec<String>,

    #[serde(default = "default_comment_thread")]
    pub comment_thread: Vec<String>,

    #[serde(default = "default_hardened")]
    pub hardened: Vec<String>,

    #[serde(default = "default_structured_proxy")]
    pub structured_proxy: Vec<String>,

    /// Page titles shown by anti-bot interstitials.
    #[serde(default = "default_challenge_titles")]
    pub challenge_titles: Vec<String>,
}

fn default_social_permalink() -> Vec<String> {
    vec!["twitter.com".into(), "x.com".into()]
}

fn default_comment_thread() -> Vec<String> {
    vec!["reddit.com".into()]
}

fn default_hardened() -> Vec<String> {
    vec!["zillow.com".into(), "etsy.com".into()]
}

fn default_structured_proxy() -> Vec<String> {
    vec!["linkedin.com".into(), "instagram.com".into()]
}

pub fn default_challenge_titles() -> Vec<String> {
    vec![
        "Just a moment...".into(),
        "Attention Required! | Cloudflare".into(),
    ]
}

impl Default for SiteTable {
    fn default() -> Self {
        Self {
            social_permalink: default_social_permalink(),
            comment_thread: default_comment_thread(),
            hardened: default_hardened(),
            structured_proxy: default_structured_proxy(),
            challenge_titles: default_challenge_titles(),
        }
    }
}

impl SiteTable {
    /// An empty table: every host is `Default`.
    pub fn empty() -> Self {
        Self {
            social_permalink: Vec::new(),
            comment_thread: Vec::new(),
            hardened: Vec::new(),
            structured_proxy: Vec::new(),
            challenge_titles: default_challenge_titles(),
        }
    }

    /// Load a table from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> GatewayResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read site table {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> GatewayResult<Self> {
        toml::from_str(raw).map_err(|e| GatewayError::Config(format!("invalid site table: {}", e)))
    }

    /// Classify a host. Specialized classes win over generic ones when a
    /// host appears in more than one list.
    pub fn classify(&self, host: &str) -> DomainClass {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let ordered = [
            (&self.structured_proxy, DomainClass::StructuredProxySite),
            (&self.hardened, DomainClass::HardenedSite),
            (&self.comment_thread, DomainClass::CommentThreadSite),
            (&self.social_permalink, DomainClass::SocialPermalink),
        ];
        ordered
            .into_iter()
            .find(|(domains, _)| domains.iter().any(|d| host_matches(&host, d)))
            .map(|(_, class)| class)
            .unwrap_or(DomainClass::Default)
    }
}

/// Exact-or-subdomain match. `host` must already be lowercase.
fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Parse a request URL and return it with its host.
pub fn parse_target(raw: &str) -> GatewayResult<(Url, String)> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(GatewayError::InvalidInput(format!(
                "unsupported URL scheme '{}'",
                other
            )))
        }
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| GatewayError::InvalidInput(format!("URL has no host: {}", raw)))?
        .to_string();
    Ok((url, host))
}

/// Rewrite a status permalink to the syndication endpoint carrying its id.
pub fn rewrite_permalink(url: &Url) -> GatewayResult<String> {
    let id = STATUS_ID
        .captures(url.path())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            GatewayError::InvalidInput(format!("no status id found in permalink {}", url))
        })?;

    Ok(format!(
        "{}?id={}&lang=en",
        SYNDICATION_ENDPOINT,
        urlencoding::encode(id)
    ))
}
