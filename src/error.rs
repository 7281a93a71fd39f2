//! Gateway error types.

use thiserror::Error;

/// Errors raised while dispatching a fetch.
///
/// Only [`GatewayError::InvalidInput`] and [`GatewayError::Upstream`] are ever
/// returned from [`crate::dispatch::Dispatcher::handle`]; everything else is
/// folded into a degraded [`crate::models::FetchResult`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Navigation failed: {0}")]
    NavigationFailure(String),
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("Challenge page did not clear after {0}s")]
    ChallengeTimeout(u64),
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// HTTP status used when this error reaches an HTTP caller.
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::InvalidInput(_) => 400,
            GatewayError::Upstream { .. } => 502,
            _ => 500,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for GatewayError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        GatewayError::Browser(e.to_string())
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(e: url::ParseError) -> Self {
        GatewayError::InvalidInput(format!("unparseable URL: {}", e))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
