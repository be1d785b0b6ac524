//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::cache::ttl;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:5000").
    pub bind_addr: String,

    /// Bearer token for the X API. Requests for X data fail with a 500 when
    /// this is unset.
    pub x_bearer_token: Option<String>,

    /// Optional GitHub token. Anonymous requests work but get a lower quota.
    pub github_token: Option<String>,

    /// X API base URL, without trailing slash.
    pub x_api_base_url: String,

    /// GitHub API base URL, without trailing slash.
    pub github_api_base_url: String,

    /// SQLite database for the persistent cache. In-memory when unset.
    pub cache_db_path: Option<PathBuf>,

    /// How long a cached profile stays fresh.
    pub profile_ttl: Duration,

    /// How long the cached trends document stays fresh.
    pub trends_ttl: Duration,

    /// Counted requests allowed per client per window.
    pub rate_limit_max: u32,

    /// Rate-limit window length.
    pub rate_limit_window: Duration,

    /// Timeout for each upstream HTTP call.
    pub upstream_timeout: Duration,

    /// Interval between background sweeps of expired state.
    pub sweep_interval: Duration,

    /// Allowed CORS origin. Any origin when unset.
    pub cors_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            x_bearer_token: None,
            github_token: None,
            x_api_base_url: "https://api.x.com".to_string(),
            github_api_base_url: "https://api.github.com".to_string(),
            cache_db_path: None,
            profile_ttl: ttl::PROFILE,
            trends_ttl: ttl::TRENDS,
            rate_limit_max: 3,
            rate_limit_window: Duration::from_secs(24 * 60 * 60),
            upstream_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(300),
            cors_origin: None,
        }
    }
}

/// Non-empty, trimmed value of `key`.
fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `key` as a number, falling back to `default` when unset.
fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

/// Longest accepted TTL, window, timeout or sweep interval.
const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Parse `key` as whole seconds between 1 and [`MAX_DURATION`].
fn parse_secs(key: &str, default: Duration) -> anyhow::Result<Duration> {
    let value = parse_var(key, default.as_secs()).map(Duration::from_secs)?;
    if value.is_zero() {
        anyhow::bail!("{key} must be at least 1");
    }
    if value > MAX_DURATION {
        anyhow::bail!("{key} must be at most {} seconds", MAX_DURATION.as_secs());
    }
    Ok(value)
}

fn base_url(key: &str, default: &str) -> String {
    non_empty(key)
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - None (all have defaults for local development)
    ///
    /// Optional:
    /// - `RECEIPT_BIND_ADDR`: Server bind address (default: "0.0.0.0:5000")
    /// - `X_BEARER_TOKEN`: X API token (falls back to `TWITTER_BEARER_TOKEN`)
    /// - `GITHUB_TOKEN`: GitHub API token
    /// - `X_API_BASE_URL`: X API base (default: "https://api.x.com")
    /// - `GITHUB_API_BASE_URL`: GitHub API base (default: "https://api.github.com")
    /// - `RECEIPT_CACHE_DB`: SQLite path; enables the persistent backend
    /// - `RECEIPT_PROFILE_TTL_SECS`: Profile freshness (default: 86400)
    /// - `RECEIPT_TRENDS_TTL_SECS`: Trends freshness (default: 900)
    /// - `RECEIPT_RATE_LIMIT_MAX`: Requests per window (default: 3)
    /// - `RECEIPT_RATE_LIMIT_WINDOW_SECS`: Window length (default: 86400)
    /// - `RECEIPT_UPSTREAM_TIMEOUT_SECS`: Upstream timeout (default: 10)
    /// - `RECEIPT_SWEEP_INTERVAL_SECS`: Sweep interval (default: 300)
    /// - `RECEIPT_CORS_ORIGIN`: Allowed origin (default: any)
    ///
    /// Every `*_SECS` value must be between 1 second and 365 days.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = non_empty("RECEIPT_BIND_ADDR").unwrap_or(defaults.bind_addr);

        let x_bearer_token =
            non_empty("X_BEARER_TOKEN").or_else(|| non_empty("TWITTER_BEARER_TOKEN"));
        let github_token = non_empty("GITHUB_TOKEN");

        let x_api_base_url = base_url("X_API_BASE_URL", &defaults.x_api_base_url);
        let github_api_base_url = base_url("GITHUB_API_BASE_URL", &defaults.github_api_base_url);

        let cache_db_path = non_empty("RECEIPT_CACHE_DB").map(PathBuf::from);

        let profile_ttl = parse_secs("RECEIPT_PROFILE_TTL_SECS", defaults.profile_ttl)?;
        let trends_ttl = parse_secs("RECEIPT_TRENDS_TTL_SECS", defaults.trends_ttl)?;

        let rate_limit_max = parse_var("RECEIPT_RATE_LIMIT_MAX", defaults.rate_limit_max)?;
        if rate_limit_max == 0 {
            anyhow::bail!("RECEIPT_RATE_LIMIT_MAX must be at least 1");
        }

        let rate_limit_window =
            parse_secs("RECEIPT_RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window)?;

        let upstream_timeout =
            parse_secs("RECEIPT_UPSTREAM_TIMEOUT_SECS", defaults.upstream_timeout)?;
        let sweep_interval = parse_secs("RECEIPT_SWEEP_INTERVAL_SECS", defaults.sweep_interval)?;

        let cors_origin = non_empty("RECEIPT_CORS_ORIGIN");

        tracing::info!(
            bind_addr = %bind_addr,
            x_token = x_bearer_token.is_some(),
            github_token = github_token.is_some(),
            x_api = %x_api_base_url,
            github_api = %github_api_base_url,
            cache_db = ?cache_db_path,
            rate_limit_max,
            rate_limit_window_secs = rate_limit_window.as_secs(),
            "configuration loaded"
        );

        if x_bearer_token.is_none() {
            tracing::warn!("X_BEARER_TOKEN is not set; X lookups will fail");
        }

        Ok(Self {
            bind_addr,
            x_bearer_token,
            github_token,
            x_api_base_url,
            github_api_base_url,
            cache_db_path,
            profile_ttl,
            trends_ttl,
            rate_limit_max,
            rate_limit_window,
            upstream_timeout,
            sweep_interval,
            cors_origin,
        })
    }
}
