//! Response caching for normalized profile documents.
//!
//! Entries are keyed by [`CacheKey`] (`provider:lowercased-username`) and
//! carry the time they were written. An entry is fresh while
//! `now - cached_at < ttl`; stale entries stay in the store until they are
//! overwritten or swept.
//!
//! ## Fill locks
//!
//! A miss takes a per-key async lock, re-checks the store, and only then
//! runs the fill. Concurrent requests for the same username therefore cause
//! one upstream call; the others wake up to a cache hit.
//!
//! ## TTL Guidelines
//!
//! | Data Type | TTL |
//! |-----------|-----|
//! | Profiles | 24 hours |
//! | Trends | 15 minutes |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::clock::Clock;
use crate::store::{CacheKey, CachedProfile, ProfileStore};

/// Upper bound on tracked fill locks.
const FILL_LOCK_CAPACITY: u64 = 10_000;

/// Idle time after which an unused fill lock is dropped.
const FILL_LOCK_IDLE: Duration = Duration::from_secs(60);

/// Common TTL values.
pub mod ttl {
    use std::time::Duration;

    /// Profiles - 24 hours
    pub const PROFILE: Duration = Duration::from_secs(24 * 60 * 60);

    /// Trends - 15 minutes
    pub const TRENDS: Duration = Duration::from_secs(15 * 60);
}

/// Result of [`ProfileCache::get_or_fill`].
#[derive(Debug)]
pub enum CacheOutcome<T> {
    /// Served from the cache; the fill did not run.
    Hit(CachedProfile),
    /// The fill ran and its document was stored.
    Filled {
        entry: CachedProfile,
        /// Whatever else the fill returned alongside the document.
        extra: T,
    },
}

impl<T> CacheOutcome<T> {
    pub fn entry(&self) -> &CachedProfile {
        match self {
            Self::Hit(entry) | Self::Filled { entry, .. } => entry,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// TTL cache over an injected [`ProfileStore`].
#[derive(Clone)]
pub struct ProfileCache {
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    locks: Cache<CacheKey, Arc<Mutex<()>>>,
}

impl ProfileCache {
    pub fn new(store: Arc<dyn ProfileStore>, clock: Arc<dyn Clock>) -> Self {
        let locks = Cache::builder()
            .max_capacity(FILL_LOCK_CAPACITY)
            .time_to_idle(FILL_LOCK_IDLE)
            .build();

        Self {
            store,
            clock,
            locks,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Whether `entry` is still within `ttl` at `now`.
    pub fn is_fresh(entry: &CachedProfile, now: DateTime<Utc>, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - entry.cached_at < ttl,
            Err(_) => true,
        }
    }

    /// Fetch the entry for `key` if it is fresh. Store errors count as a miss.
    pub fn get_fresh(&self, key: &CacheKey, ttl: Duration) -> Option<CachedProfile> {
        match self.store.get(key) {
            Ok(Some(entry)) if Self::is_fresh(&entry, self.clock.now(), ttl) => {
                tracing::debug!(key = %key, cached_at = %entry.cached_at, "cache hit");
                Some(entry)
            }
            Ok(Some(entry)) => {
                tracing::debug!(key = %key, cached_at = %entry.cached_at, "cache entry stale");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store `document` under `key`, stamped with the current time.
    ///
    /// A failed write is logged; the entry is returned either way so the
    /// caller can still serve it.
    pub fn put(&self, key: CacheKey, document: serde_json::Value) -> CachedProfile {
        let entry = CachedProfile {
            key,
            document,
            cached_at: self.clock.now(),
        };

        if let Err(e) = self.store.put(entry.clone()) {
            tracing::warn!(key = %entry.key, error = %e, "cache write failed");
        }

        entry
    }

    /// Get a fresh cached document or fill it.
    ///
    /// This is the main caching helper. It:
    /// 1. Returns a fresh entry without locking (unless `bypass` is set)
    /// 2. Takes the fill lock for `key` and re-checks
    /// 3. Runs `fill` and stores the document it returns
    ///
    /// Failed fills are not cached.
    pub async fn get_or_fill<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        bypass: bool,
        fill: F,
    ) -> Result<CacheOutcome<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(serde_json::Value, T), E>>,
    {
        if !bypass {
            if let Some(entry) = self.get_fresh(key, ttl) {
                return Ok(CacheOutcome::Hit(entry));
            }
        }

        let _guard = self.lock(key).await;

        if !bypass {
            if let Some(entry) = self.get_fresh(key, ttl) {
                return Ok(CacheOutcome::Hit(entry));
            }
        }

        tracing::debug!(key = %key, bypass, "cache miss, filling");
        let (document, extra) = fill().await?;
        let entry = self.put(key.clone(), document);

        Ok(CacheOutcome::Filled { entry, extra })
    }

    /// Remove entries older than `max_age`.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let cutoff = match chrono::Duration::from_std(max_age) {
            Ok(age) => self.clock.now() - age,
            Err(_) => return 0,
        };

        match self.store.purge_older_than(cutoff) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "cache sweep failed");
                0
            }
        }
    }

    async fn lock(&self, key: &CacheKey) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with(key.clone(), async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }
}
