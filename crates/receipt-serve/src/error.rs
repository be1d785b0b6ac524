//! API error types and response formatting.
//!
//! Every error renders as JSON `{ "error": <category>, "details": <text> }`.
//! Both rate-limit variants add `resetTime` (RFC 3339) and a `Retry-After`
//! header so clients can show a countdown.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::upstream::UpstreamError;

/// Fallback `Retry-After` when upstream throttles without a reset time.
pub const DEFAULT_RETRY_AFTER_SECS: i64 = 60;

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed provider or username.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Upstream reports no such user.
    #[error("not found: {0}")]
    NotFound(String),

    /// This service's own per-client limit.
    #[error("rate limit exceeded until {reset_at}")]
    RateLimitExceeded {
        limit: u32,
        reset_at: DateTime<Utc>,
    },

    /// The upstream API is throttling us.
    #[error("upstream rate limited")]
    UpstreamRateLimited { reset_at: Option<DateTime<Utc>> },

    /// Upstream rejected our credential.
    #[error("upstream authentication failed: {0}")]
    Auth(String),

    /// Upstream refused access to the resource.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The upstream credential is not configured.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// Upstream failed or returned something unusable.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<receipt_core::Error> for ApiError {
    fn from(err: receipt_core::Error) -> Self {
        match err {
            receipt_core::Error::Json(e) => Self::Internal(e.into()),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotFound(msg) => Self::NotFound(msg),
            UpstreamError::RateLimited { reset_at } => Self::UpstreamRateLimited { reset_at },
            UpstreamError::Auth(msg) => Self::Auth(msg),
            UpstreamError::AccessDenied(msg) => Self::AccessDenied(msg),
            UpstreamError::MissingCredential(var) => Self::MissingCredential(format!(
                "{var} is not set; configure the upstream API token"
            )),
            UpstreamError::Unavailable(msg) => Self::Unavailable(msg),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: &'static str,
    details: String,
    #[serde(rename = "resetTime", skip_serializing_if = "Option::is_none")]
    reset_time: Option<String>,
}

/// Whole seconds from now until `reset_at`, at least 1.
pub fn retry_after_secs(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (reset_at - now).num_milliseconds();
    ((millis + 999) / 1000).max(1)
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimitExceeded { .. } | Self::UpstreamRateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::MissingCredential(_) | Self::Unavailable(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Render relative to `now`; [`IntoResponse`] uses the wall clock.
    pub fn into_response_at(self, now: DateTime<Utc>) -> Response {
        let status = self.status();
        let mut headers = HeaderMap::new();

        let (error, details, reset_at) = match self {
            Self::BadRequest(msg) => ("Invalid request", msg, None),
            Self::NotFound(msg) => ("User not found", msg, None),
            Self::RateLimitExceeded { limit, reset_at } => {
                headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
                headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
                headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at.timestamp()));
                (
                    "Rate limit exceeded",
                    format!("You can only generate {limit} receipts per window"),
                    Some(reset_at),
                )
            }
            Self::UpstreamRateLimited { reset_at } => (
                "Upstream rate limit exceeded",
                "The upstream API is throttling requests. Please try again later.".to_string(),
                // Without a reset hint, advertise the default retry delay.
                Some(reset_at.unwrap_or_else(|| {
                    now + chrono::Duration::seconds(DEFAULT_RETRY_AFTER_SECS)
                })),
            ),
            Self::Auth(msg) => ("Authentication error", msg, None),
            Self::AccessDenied(msg) => ("Access denied", msg, None),
            Self::MissingCredential(msg) => {
                tracing::error!(details = %msg, "upstream credential missing");
                ("Server configuration error", msg, None)
            }
            Self::Unavailable(msg) => {
                tracing::error!(details = %msg, "upstream unavailable");
                ("Upstream unavailable", msg, None)
            }
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    "Internal error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        if let Some(reset_at) = reset_at {
            headers.insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(reset_at, now)),
            );
        }

        let body = ErrorResponse {
            error,
            details,
            reset_time: reset_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        };

        (status, headers, Json(body)).into_response()
    }
}

/// Wall-clock rendering. Handlers go through `routes::respond`, which uses
/// the state clock.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_at(Utc::now())
    }
}
