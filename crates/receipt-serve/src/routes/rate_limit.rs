//! Read-only quota endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use chrono::SecondsFormat;
use serde::Serialize;

use crate::client_id::ClientId;
use crate::state::AppState;

/// Caller's quota.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResponse {
    pub remaining: u32,
    pub limit: u32,
    /// RFC 3339 end of the current window, `null` when none is open.
    pub reset_time: Option<String>,
}

/// `GET /api/rate-limit`
///
/// Reports the caller's remaining lookups without consuming one.
pub async fn status(State(state): State<AppState>, client: ClientId) -> Response {
    let status = state.limiter.status(client.as_str());

    let body = RateLimitResponse {
        remaining: status.remaining,
        limit: status.limit,
        reset_time: status
            .reset_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
    };

    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(body),
    )
        .into_response()
}
