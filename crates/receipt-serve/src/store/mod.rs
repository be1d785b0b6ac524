//! Storage backends for cached profiles and rate-limit windows.
//!
//! Both concerns sit behind traits so the service can run on the bounded
//! in-memory backend ([`MemoryStore`]) or on SQLite ([`SqliteStore`]), and
//! tests can drive either with a controllable clock.
//!
//! ## Atomicity
//!
//! `RateLimitStore::increment` is a single read-modify-write per client:
//! the memory backend uses moka's per-key compute, SQLite runs it inside a
//! transaction on a mutex-guarded connection. Profile writes are plain
//! upserts; duplicate fills are prevented one level up by the fill locks in
//! [`crate::cache`].

mod memory;
mod schema;
mod sqlite;

use std::fmt;

use chrono::{DateTime, Utc};
use receipt_core::Provider;

use crate::ratelimit::{RateLimitPolicy, WindowOutcome};

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error (creating the database directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored timestamp is out of range.
    #[error("invalid timestamp {0}")]
    InvalidTimestamp(i64),
}

/// Cache key: `provider:lowercased-username`.
///
/// This is the only place usernames are case-folded, so every path that
/// reads or writes the cache agrees on the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a user profile.
    pub fn profile(provider: Provider, username: &str) -> Self {
        Self(format!("{}:{}", provider.as_str(), username.to_lowercase()))
    }

    /// Key for the provider's trends document.
    pub fn trends(provider: Provider) -> Self {
        Self(format!("{}:trends:personalized", provider.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized document stored under a [`CacheKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct CachedProfile {
    pub key: CacheKey,
    pub document: serde_json::Value,
    pub cached_at: DateTime<Utc>,
}

/// Fixed-window counter state for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub client_id: String,
    pub request_count: u32,
    pub window_reset_at: DateTime<Utc>,
}

impl RateLimitRecord {
    /// Whether the window has closed. The reset instant itself still belongs
    /// to the window.
    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        now > self.window_reset_at
    }
}

/// Storage for cached documents.
pub trait ProfileStore: Send + Sync {
    /// Look up the entry for `key`, fresh or not.
    fn get(&self, key: &CacheKey) -> StoreResult<Option<CachedProfile>>;

    /// Insert or replace the entry for `entry.key`.
    fn put(&self, entry: CachedProfile) -> StoreResult<()>;

    /// Drop entries cached before `cutoff`. Returns how many were removed.
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}

/// Storage for rate-limit windows.
pub trait RateLimitStore: Send + Sync {
    /// Current record for a client, if any.
    fn get(&self, client_id: &str) -> StoreResult<Option<RateLimitRecord>>;

    /// Atomically apply one request to the client's window.
    fn increment(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> StoreResult<WindowOutcome>;

    /// Drop records whose window closed before `now`.
    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_keys_are_case_insensitive() {
        assert_eq!(
            CacheKey::profile(Provider::X, "Alice"),
            CacheKey::profile(Provider::X, "aLiCe")
        );
        assert_eq!(CacheKey::profile(Provider::X, "Alice").as_str(), "x:alice");
    }

    #[test]
    fn keys_are_scoped_by_provider() {
        assert_ne!(
            CacheKey::profile(Provider::X, "alice"),
            CacheKey::profile(Provider::Github, "alice")
        );
        assert_eq!(
            CacheKey::trends(Provider::X).to_string(),
            "x:trends:personalized"
        );
    }
}
