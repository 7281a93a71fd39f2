//! Web server command.

use console::style;

use crate::config::Settings;

const DEFAULT_PORT: u16 = 3000;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let (host, port) = parse_bind_address(bind)?;

    if settings.remote.api_key.is_none() {
        println!(
            "  {} BROWSERBASE_API_KEY not set, remote sessions will fail",
            style("!").yellow()
        );
    }
    if settings.proxy.api_key.is_none() {
        println!(
            "  {} PROXY_SCRAPE_API_KEY not set, proxy scrapes will fail",
            style("!").yellow()
        );
    }

    println!(
        "{} Starting fetchgate at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "3000" -> 0.0.0.0:3000
/// - Just a host: "127.0.0.1" -> 127.0.0.1:3000
/// - Host and port: "127.0.0.1:8080" -> 127.0.0.1:8080
fn parse_bind_address(bind: &str) -> anyhow::Result<(String, u16)> {
    if bind.is_empty() {
        anyhow::bail!("empty bind address");
    }

    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("0.0.0.0".to_string(), port));
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    Ok((bind.to_string(), DEFAULT_PORT))
}
