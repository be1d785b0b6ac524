//! Application state shared across all request handlers.

use std::sync::Arc;

use anyhow::Context;

use crate::cache::ProfileCache;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::ratelimit::{RateLimitPolicy, RateLimiter};
use crate::store::{MemoryStore, ProfileStore, RateLimitStore, SqliteStore};
use crate::upstream::{self, GithubClient, XClient};

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,

    /// TTL cache of normalized profile and trends documents.
    pub cache: ProfileCache,

    /// Per-client fixed-window limiter for upstream lookups.
    pub limiter: RateLimiter,

    pub x: XClient,

    pub github: GithubClient,
}

impl AppState {
    /// Create a new application state from configuration.
    ///
    /// Uses the SQLite backend when `cache_db_path` is set, the bounded
    /// in-memory backend otherwise.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (profiles, windows): (Arc<dyn ProfileStore>, Arc<dyn RateLimitStore>) =
            match &config.cache_db_path {
                Some(path) => {
                    let store = Arc::new(
                        SqliteStore::open(path)
                            .with_context(|| format!("opening cache database {}", path.display()))?,
                    );
                    let profiles: Arc<dyn ProfileStore> = store.clone();
                    let windows: Arc<dyn RateLimitStore> = store;
                    (profiles, windows)
                }
                None => {
                    let retention = config.profile_ttl.max(config.trends_ttl);
                    let store = Arc::new(MemoryStore::new(retention, config.rate_limit_window));
                    let profiles: Arc<dyn ProfileStore> = store.clone();
                    let windows: Arc<dyn RateLimitStore> = store;
                    (profiles, windows)
                }
            };

        Self::from_parts(config, profiles, windows, clock)
    }

    /// Assemble state from explicit stores and clock.
    pub fn from_parts(
        config: Config,
        profiles: Arc<dyn ProfileStore>,
        windows: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let http =
            upstream::http_client(config.upstream_timeout).context("building HTTP client")?;

        let x = XClient::new(
            http.clone(),
            config.x_api_base_url.clone(),
            config.x_bearer_token.clone(),
        );
        let github = GithubClient::new(
            http,
            config.github_api_base_url.clone(),
            config.github_token.clone(),
        );

        let policy = RateLimitPolicy {
            limit: config.rate_limit_max,
            window: chrono::Duration::from_std(config.rate_limit_window)
                .context("rate limit window out of range")?,
        };

        tracing::info!(
            rate_limit = policy.limit,
            window_secs = policy.window.num_seconds(),
            profile_ttl_secs = config.profile_ttl.as_secs(),
            trends_ttl_secs = config.trends_ttl.as_secs(),
            "application state initialized"
        );

        Ok(Self {
            cache: ProfileCache::new(profiles, clock.clone()),
            limiter: RateLimiter::new(windows, clock, policy),
            x,
            github,
            config: Arc::new(config),
        })
    }

    /// Drop closed rate-limit windows and cache rows past every TTL.
    pub fn sweep(&self) {
        let windows = self.limiter.sweep();
        let max_age = self.config.profile_ttl.max(self.config.trends_ttl);
        let profiles = self.cache.sweep(max_age);

        if windows > 0 || profiles > 0 {
            tracing::info!(windows, profiles, "swept expired state");
        }
    }
}
