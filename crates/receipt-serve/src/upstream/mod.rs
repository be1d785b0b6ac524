//! HTTP clients for the upstream profile APIs.
//!
//! Each client returns [`UpstreamError`] for every failure. Status codes are
//! classified in one place ([`classify`]) so X and GitHub map onto the same
//! taxonomy; only a human-readable description crosses into the API layer.

mod github;
mod x;

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

pub use self::github::GithubClient;
pub use self::x::XClient;

/// Failures talking to an upstream API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("{0}")]
    NotFound(String),

    #[error("upstream rate limited")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    AccessDenied(String),

    /// The named environment variable holds no credential.
    #[error("{0} is not set")]
    MissingCredential(&'static str),

    #[error("{0}")]
    Unavailable(String),
}

/// Build the shared HTTP client for upstream calls.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let builder = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("receipt-serve/", env!("CARGO_PKG_VERSION")));

    // Test upstreams listen on loopback.
    #[cfg(test)]
    let builder = builder.no_proxy();

    builder.build()
}

/// Reset instant from `x-rate-limit-reset` (X) or `x-ratelimit-reset`
/// (GitHub), both epoch seconds.
fn reset_from_headers(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    ["x-rate-limit-reset", "x-ratelimit-reset"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.trim().parse::<i64>().ok())
        .find_map(|secs| DateTime::from_timestamp(secs, 0))
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    ["x-rate-limit-remaining", "x-ratelimit-remaining"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .any(|v| v.to_str().is_ok_and(|v| v.trim() == "0"))
}

/// Map a non-success upstream status onto [`UpstreamError`].
///
/// `subject` names what was requested, e.g. `X user @alice`.
pub fn classify(status: StatusCode, headers: &HeaderMap, subject: &str) -> UpstreamError {
    match status {
        StatusCode::NOT_FOUND => UpstreamError::NotFound(format!("{subject} not found")),
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited {
            reset_at: reset_from_headers(headers),
        },
        // GitHub signals an exhausted quota with 403.
        StatusCode::FORBIDDEN if quota_exhausted(headers) => UpstreamError::RateLimited {
            reset_at: reset_from_headers(headers),
        },
        StatusCode::UNAUTHORIZED => UpstreamError::Auth(format!(
            "upstream rejected the configured credential while fetching {subject}"
        )),
        StatusCode::FORBIDDEN => {
            UpstreamError::AccessDenied(format!("access to {subject} was denied upstream"))
        }
        other => UpstreamError::Unavailable(format!(
            "upstream returned {other} while fetching {subject}"
        )),
    }
}

/// Send `request` and turn transport failures and non-success statuses into
/// [`UpstreamError`].
async fn send(
    request: reqwest::RequestBuilder,
    subject: &str,
) -> Result<reqwest::Response, UpstreamError> {
    let response = request.send().await.map_err(|e| {
        tracing::warn!(subject = %subject, error = %e, "upstream request failed");
        if e.is_timeout() {
            UpstreamError::Unavailable(format!("upstream timed out while fetching {subject}"))
        } else {
            UpstreamError::Unavailable(format!("upstream request failed while fetching {subject}"))
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let err = classify(status, response.headers(), subject);
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(
        subject = %subject,
        status = status.as_u16(),
        body = %body.chars().take(512).collect::<String>(),
        "upstream returned error status"
    );
    Err(err)
}

/// Decode a JSON body, treating malformed payloads as an unavailable upstream.
async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    subject: &str,
) -> Result<T, UpstreamError> {
    response.json::<T>().await.map_err(|e| {
        tracing::warn!(subject = %subject, error = %e, "undecodable upstream body");
        UpstreamError::Unavailable(format!("unexpected response while fetching {subject}"))
    })
}
