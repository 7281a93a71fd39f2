//! One-shot fetch command.

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::models::FetchRequest;
use crate::server::AppState;

/// Dispatch a single request and print the result as JSON.
pub async fn cmd_fetch(
    settings: &Settings,
    url: &str,
    wait_after_load: u64,
    timeout: u64,
    headers: &[String],
) -> anyhow::Result<()> {
    let mut request = FetchRequest::new(url)
        .with_wait_after_load(wait_after_load)
        .with_timeout(timeout);
    for raw in headers {
        let (name, value) = parse_header(raw)?;
        request = request.with_header(name, value);
    }

    eprintln!("{} Fetching {}", style("→").cyan(), url);

    let state = AppState::new(settings).await?;
    let outcome = state.dispatcher.handle(request).await;
    state.shutdown().await;

    let result = outcome.context("fetch rejected")?;
    if result.page_error.is_empty() {
        eprintln!("  {} {}", style("✓").green(), result.page_status_code);
    } else {
        eprintln!(
            "  {} {} {}",
            style("!").yellow(),
            result.page_status_code,
            result.page_error
        );
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Split `NAME:VALUE`, trimming whitespace around both parts.
fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("header must be NAME:VALUE, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header name is empty in {:?}", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}
