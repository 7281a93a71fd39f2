//! Navigate/wait/capture sequence shared by the local renderer and the
//! remote session client.

use std::collections::HashMap;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetBlockedUrLsParams, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

/// Send caller headers with every request the page makes.
pub(crate) async fn apply_headers(
    page: &Page,
    headers: Option<&HashMap<String, String>>,
) -> GatewayResult<()> {
    let Some(headers) = headers else {
        return Ok(());
    };
    debug!("Applying {} extra headers", headers.len());
    let value = serde_json::to_value(headers)
        .map_err(|e| GatewayError::InvalidInput(format!("invalid headers: {}", e)))?;
    page.execute(SetExtraHttpHeadersParams::new(Headers::new(value)))
        .await?;
    Ok(())
}

/// Abort requests whose URL matches any of `patterns`.
pub(crate) async fn block_urls(page: &Page, patterns: &[&str]) -> GatewayResult<()> {
    let urls = patterns.iter().map(|p| p.to_string()).collect::<Vec<_>>();
    page.execute(SetBlockedUrLsParams::new(urls)).await?;
    Ok(())
}

/// Navigate and wait for the load event, bounded by `timeout`.
///
/// Returns the HTTP status of the main navigation response. Timeouts, DNS
/// and connection failures are [`GatewayError::NavigationFailure`].
pub(crate) async fn navigate(page: &Page, url: &str, timeout: Duration) -> GatewayResult<u16> {
    debug!("Navigating to {}", url);
    let params = NavigateParams::builder()
        .url(url)
        .build()
        .map_err(|e| GatewayError::InvalidInput(format!("Invalid URL: {}", e)))?;

    let navigation = async {
        let nav = page.execute(params).await?;
        if let Some(error_text) = nav.result.error_text.clone() {
            return Err(GatewayError::NavigationFailure(format!(
                "{} for {}",
                error_text, url
            )));
        }
        let request = page.wait_for_navigation_response().await?;
        let status = request.as_ref().and_then(|r| {
            r.response
                .as_ref()
                .and_then(|resp| u16::try_from(resp.status).ok())
        });
        status.ok_or_else(|| {
            let reason = request
                .as_ref()
                .and_then(|r| r.failure_text.clone())
                .unwrap_or_else(|| "no response".to_string());
            GatewayError::NavigationFailure(format!("{} for {}", reason, url))
        })
    };

    match tokio::time::timeout(timeout, navigation).await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(GatewayError::Browser(e))) => Err(GatewayError::NavigationFailure(format!(
            "Navigation failed for {}: {}",
            url, e
        ))),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(GatewayError::NavigationFailure(format!(
            "Navigation timed out after {}ms for {}",
            timeout.as_millis(),
            url
        ))),
    }
}

/// Pause after load so client-side rendering can settle. Zero never sleeps.
pub async fn settle(wait: Duration) {
    if wait.is_zero() {
        return;
    }
    debug!("Waiting {}ms after load", wait.as_millis());
    tokio::time::sleep(wait).await;
}
