//! Request handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use super::AppState;
use crate::error::GatewayError;
use crate::models::FetchRequest;

/// Fetch a page through the dispatcher.
pub async fn fetch_html(
    State(state): State<AppState>,
    Json(request): Json<FetchRequest>,
) -> Response {
    match state.dispatcher.handle(request).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &GatewayError) -> Response {
    debug!("Request rejected: {}", error);
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "detail": error.to_string() }))).into_response()
}

pub async fn liveness() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Ready only while the local browser is running.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let ready = match &state.browser {
        Some(browser) => browser.is_ready().await,
        None => false,
    };

    if ready {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "Service Unavailable" })),
        )
    }
}
