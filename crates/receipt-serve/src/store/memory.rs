//! Bounded in-memory backend built on moka.
//!
//! Both maps are capacity-bounded and expire entries on their own, so memory
//! stays flat no matter how many distinct clients or usernames show up.
//! Expiry here is only physical cleanup; freshness and window decisions are
//! always made against the injected clock.

use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::ops::compute::Op;
use moka::sync::Cache;

use super::{CacheKey, CachedProfile, ProfileStore, RateLimitRecord, RateLimitStore, StoreResult};
use crate::ratelimit::{RateLimitPolicy, WindowOutcome};

/// Default profile capacity. A normalized profile is ~1-3KB of JSON.
pub const DEFAULT_PROFILE_CAPACITY: u64 = 50_000;

/// Default number of tracked clients.
pub const DEFAULT_CLIENT_CAPACITY: u64 = 100_000;

/// In-memory profile and rate-limit store.
pub struct MemoryStore {
    profiles: Cache<CacheKey, CachedProfile>,
    windows: Cache<String, RateLimitRecord>,
}

impl MemoryStore {
    /// Create a store that retains documents for `retention` and windows for
    /// `window` after their last update.
    pub fn new(retention: Duration, window: Duration) -> Self {
        Self::with_capacity(
            DEFAULT_PROFILE_CAPACITY,
            DEFAULT_CLIENT_CAPACITY,
            retention,
            window,
        )
    }

    pub fn with_capacity(
        profile_capacity: u64,
        client_capacity: u64,
        retention: Duration,
        window: Duration,
    ) -> Self {
        // A window record is last written no earlier than its window opened,
        // so expiring `window` after the write never drops an open window.
        let windows = Cache::builder()
            .max_capacity(client_capacity)
            .time_to_live(window)
            .build();

        let profiles = Cache::builder()
            .max_capacity(profile_capacity)
            .time_to_live(retention)
            .build();

        tracing::info!(
            profile_capacity,
            client_capacity,
            retention_secs = retention.as_secs(),
            window_secs = window.as_secs(),
            "in-memory store initialized"
        );

        Self { profiles, windows }
    }
}

impl ProfileStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> StoreResult<Option<CachedProfile>> {
        Ok(self.profiles.get(key))
    }

    fn put(&self, entry: CachedProfile) -> StoreResult<()> {
        self.profiles.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let stale: Vec<_> = self
            .profiles
            .iter()
            .filter(|(_, entry)| entry.cached_at < cutoff)
            .map(|(key, _)| key)
            .collect();

        for key in &stale {
            self.profiles.invalidate(&**key);
        }
        self.profiles.run_pending_tasks();

        Ok(stale.len())
    }
}

impl RateLimitStore for MemoryStore {
    fn get(&self, client_id: &str) -> StoreResult<Option<RateLimitRecord>> {
        Ok(self.windows.get(client_id))
    }

    fn increment(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> StoreResult<WindowOutcome> {
        let mut outcome = None;

        self.windows
            .entry(client_id.to_string())
            .and_compute_with(|existing| {
                let result = policy.apply(existing.map(|e| e.into_value()), client_id, now);
                let op = if result.allowed {
                    Op::Put(result.record.clone())
                } else {
                    Op::Nop
                };
                outcome = Some(result);
                op
            });

        Ok(outcome.unwrap_or_else(|| policy.apply(None, client_id, now)))
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let closed: Vec<_> = self
            .windows
            .iter()
            .filter(|(_, record)| record.window_elapsed(now))
            .map(|(client, _)| client)
            .collect();

        for client in &closed {
            self.windows.invalidate(client.as_str());
        }
        self.windows.run_pending_tasks();

        Ok(closed.len())
    }
}
