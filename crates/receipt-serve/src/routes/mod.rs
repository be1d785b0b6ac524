//! API route definitions.
//!
//! ## Routes
//!
//! - `GET /health` - Health check
//! - `GET /api/rate-limit` - Caller's remaining quota (not counted)
//! - `GET /api/{provider}/users/{username}` - Normalized profile JSON
//! - `GET /api/{provider}/users/{username}/receipt.svg` - Receipt as SVG
//! - `GET /api/{provider}/users/{username}/receipt.png` - Receipt as PNG
//! - `GET /api/{provider}/trends/personalized` - X trends (not counted)
//!
//! `provider` is `x`, `twitter` or `github`.

mod health;
mod profile;
mod rate_limit;
mod receipt;
mod trends;

#[cfg(test)]
mod tests;

use axum::Router;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware;
use axum::response::Response;
use axum::routing::get;

use crate::error::ApiError;
use crate::proxy::Lookup;
use crate::state::AppState;

/// Build the complete API router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/rate-limit", get(rate_limit::status))
        .route("/{provider}/users/{username}", get(profile::get_profile))
        .route(
            "/{provider}/users/{username}/receipt.svg",
            get(receipt::receipt_svg),
        )
        .route(
            "/{provider}/users/{username}/receipt.png",
            get(receipt::receipt_png),
        )
        .route("/{provider}/trends/personalized", get(trends::personalized))
        .layer(middleware::map_response(add_cache_headers));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .with_state(state)
}

/// Headers describing how a lookup was served.
///
/// `X-Cache-Hit` is always set; the `X-RateLimit-*` trio only when the
/// request was counted.
fn lookup_headers(lookup: &Lookup) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-cache-hit",
        HeaderValue::from_static(if lookup.cache_hit { "true" } else { "false" }),
    );

    if let Some(rate) = &lookup.rate {
        headers.insert("x-ratelimit-limit", HeaderValue::from(rate.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(rate.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(rate.reset_at.timestamp()));
    }

    headers
}

/// Render a handler result, timing errors against the state clock so
/// `Retry-After` and `resetTime` agree.
fn respond(state: &AppState, result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(|err| err.into_response_at(state.cache.now()))
}

/// Add cache headers to successful API responses that did not set their own.
///
/// Profiles are cached server-side for a day; clients may hold them briefly.
async fn add_cache_headers(response: Response) -> Response {
    if !response.status().is_success() || response.headers().contains_key(header::CACHE_CONTROL)
    {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    parts.headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=300, stale-while-revalidate=600"),
    );
    Response::from_parts(parts, body)
}
