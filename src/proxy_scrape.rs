//! Client for the third-party scraping API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

pub const DEFAULT_ENDPOINT: &str = "https://api.scrapingant.com/v2/extended";

/// Scraping API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyScrapeConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Bound on the whole HTTP call.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Page timeout passed to the provider. Kept below `timeout_secs`.
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
}

impl Default for ProxyScrapeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout_secs: default_http_timeout(),
            page_timeout_secs: default_page_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_http_timeout() -> u64 {
    60
}

fn default_page_timeout() -> u64 {
    30
}

/// Fields of the provider response that we use.
#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    html_content: Option<String>,
}

/// One GET per scrape, no retries.
#[derive(Debug, Clone)]
pub struct ProxyScrapeClient {
    config: ProxyScrapeConfig,
    client: Client,
}

impl ProxyScrapeClient {
    pub fn new(config: ProxyScrapeConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProxyScrapeConfig {
        &self.config
    }

    /// Scrape `url` and return the provider's extracted HTML.
    pub async fn scrape(&self, url: &str) -> GatewayResult<String> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let page_timeout = self.config.page_timeout_secs.to_string();

        debug!("Proxy scrape of {} via {}", url, self.config.endpoint);

        let resp = self
            .client
            .get(&self.config.endpoint)
            .bearer_auth(api_key)
            .query(&[
                ("url", url),
                ("timeout", page_timeout.as_str()),
                ("return_markdown", "false"),
                ("return_html", "true"),
                ("strip_images", "true"),
                ("strip_css", "true"),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::Upstream {
                status: e.status().map(|s| s.as_u16()).unwrap_or(502),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }

        let parsed: ScrapeResponse = resp.json().await.map_err(|e| GatewayError::Upstream {
            status: status.as_u16(),
            message: format!("unreadable scrape response: {}", e),
        })?;

        Ok(parsed.html_content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ProxyScrapeClient {
        ProxyScrapeClient::new(ProxyScrapeConfig {
            endpoint: format!("{}/v2/extended", server.uri()),
            api_key: Some("secret".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn returns_html_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/extended"))
            .and(header("authorization", "Bearer secret"))
            .and(query_param("url", "https://www.linkedin.com/in/someone"))
            .and(query_param("timeout", "30"))
            .and(query_param("return_markdown", "false"))
            .and(query_param("return_html", "true"))
            .and(query_param("strip_images", "true"))
            .and(query_param("strip_css", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "html_content": "<html>profile</html>",
                "text": "profile"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let html = client
            .scrape("https://www.linkedin.com/in/someone")
            .await
            .unwrap();
        assert_eq!(html, "<html>profile</html>");
    }

    #[tokio::test]
    async fn missing_html_content_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.scrape("https://instagram.com/p/1").await.unwrap(), "");
    }

    #[tokio::test]
    async fn non_success_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(423).set_body_string("detected"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        match client.scrape("https://instagram.com/p/1").await {
            Err(GatewayError::Upstream { status, message }) => {
                assert_eq!(status, 423);
                assert_eq!(message, "detected");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_upstream_error() {
        let client = ProxyScrapeClient::new(ProxyScrapeConfig {
            endpoint: "http://127.0.0.1:1/v2/extended".to_string(),
            api_key: Some("secret".to_string()),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        let result = client.scrape("https://instagram.com/p/1").await;
        assert!(matches!(result, Err(GatewayError::Upstream { .. })));
    }
}
