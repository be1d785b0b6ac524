//! SQLite backend for durable caching across restarts.
//!
//! Timestamps are stored as Unix milliseconds. All access goes through one
//! mutex-guarded connection; the rate-limit increment runs in a transaction
//! so concurrent requests from one client cannot lose updates.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};

use super::schema;
use super::{
    CacheKey, CachedProfile, ProfileStore, RateLimitRecord, RateLimitStore, StoreError,
    StoreResult,
};
use crate::ratelimit::{RateLimitPolicy, WindowOutcome};

/// SQLite-backed profile and rate-limit store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::init_schema(&conn)?;

        tracing::info!(path = %path.display(), "sqlite store opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(StoreError::InvalidTimestamp(ms))
}

fn read_window(conn: &Connection, client_id: &str) -> StoreResult<Option<RateLimitRecord>> {
    let row = conn
        .query_row(
            "SELECT request_count, window_reset_at FROM rate_limits WHERE client_id = ?1",
            [client_id],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    row.map(|(request_count, reset_ms)| {
        Ok(RateLimitRecord {
            client_id: client_id.to_string(),
            request_count,
            window_reset_at: from_millis(reset_ms)?,
        })
    })
    .transpose()
}

impl ProfileStore for SqliteStore {
    fn get(&self, key: &CacheKey) -> StoreResult<Option<CachedProfile>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT data, cached_at FROM profile_cache WHERE cache_key = ?1",
                [key.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        row.map(|(data, cached_ms)| {
            Ok(CachedProfile {
                key: key.clone(),
                document: serde_json::from_str(&data)?,
                cached_at: from_millis(cached_ms)?,
            })
        })
        .transpose()
    }

    fn put(&self, entry: CachedProfile) -> StoreResult<()> {
        let data = serde_json::to_string(&entry.document)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO profile_cache (cache_key, data, cached_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(cache_key) DO UPDATE SET data = excluded.data, cached_at = excluded.cached_at",
            rusqlite::params![entry.key.as_str(), data, entry.cached_at.timestamp_millis()],
        )?;
        Ok(())
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM profile_cache WHERE cached_at < ?1",
            [cutoff.timestamp_millis()],
        )?;
        Ok(removed)
    }
}

impl RateLimitStore for SqliteStore {
    fn get(&self, client_id: &str) -> StoreResult<Option<RateLimitRecord>> {
        let conn = self.conn.lock();
        read_window(&conn, client_id)
    }

    fn increment(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> StoreResult<WindowOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let outcome = policy.apply(read_window(&tx, client_id)?, client_id, now);
        if outcome.allowed {
            tx.execute(
                "INSERT INTO rate_limits (client_id, request_count, window_reset_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(client_id) DO UPDATE SET
                    request_count = excluded.request_count,
                    window_reset_at = excluded.window_reset_at",
                rusqlite::params![
                    client_id,
                    outcome.record.request_count,
                    outcome.record.window_reset_at.timestamp_millis()
                ],
            )?;
        }
        tx.commit()?;

        Ok(outcome)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM rate_limits WHERE window_reset_at < ?1",
            [now.timestamp_millis()],
        )?;
        Ok(removed)
    }
}
