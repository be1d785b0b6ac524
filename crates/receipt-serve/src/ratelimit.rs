//! Fixed-window rate limiting per client.
//!
//! A client gets `limit` counted requests per window. The window opens on the
//! first request (`reset_at = now + window`) and stays fixed until it
//! elapses; the first request after that opens a new window with a count of
//! 1. Rejected requests are not counted. Cache hits never reach the limiter.
//!
//! Storage errors fail open: the request is allowed and a warning is logged.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::store::{RateLimitRecord, RateLimitStore};

/// Window size and request cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Requests allowed per window.
    pub limit: u32,
    /// Window length.
    pub window: chrono::Duration,
}

impl RateLimitPolicy {
    /// Apply one request to an existing (or absent) record.
    ///
    /// This is the whole counting rule; stores call it inside their atomic
    /// section.
    pub fn apply(
        &self,
        existing: Option<RateLimitRecord>,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> WindowOutcome {
        match existing {
            Some(record) if !record.window_elapsed(now) => {
                if record.request_count >= self.limit {
                    WindowOutcome {
                        record,
                        allowed: false,
                    }
                } else {
                    WindowOutcome {
                        record: RateLimitRecord {
                            request_count: record.request_count + 1,
                            ..record
                        },
                        allowed: true,
                    }
                }
            }
            _ => WindowOutcome {
                record: RateLimitRecord {
                    client_id: client_id.to_string(),
                    request_count: 1,
                    window_reset_at: now + self.window,
                },
                allowed: true,
            },
        }
    }
}

/// Result of applying one request to a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOutcome {
    /// The record after the request (unchanged when rejected).
    pub record: RateLimitRecord,
    /// Whether the request was within the cap.
    pub allowed: bool,
}

/// Decision for a counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Read-only view of a client's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    /// `None` when the client has no open window.
    pub reset_at: Option<DateTime<Utc>>,
}

/// Rate limiter over an injected store and clock.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        policy: RateLimitPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Count one request for `client_id` and decide whether it may proceed.
    pub fn record_and_check(&self, client_id: &str) -> RateDecision {
        let now = self.clock.now();

        match self.store.increment(client_id, now, &self.policy) {
            Ok(outcome) => {
                let decision = RateDecision {
                    allowed: outcome.allowed,
                    limit: self.policy.limit,
                    remaining: self.policy.limit.saturating_sub(outcome.record.request_count),
                    reset_at: outcome.record.window_reset_at,
                };
                if !decision.allowed {
                    tracing::info!(
                        client = %client_id,
                        reset_at = %decision.reset_at,
                        "rate limit exceeded"
                    );
                }
                decision
            }
            Err(e) => {
                tracing::warn!(client = %client_id, error = %e, "rate limit store failed, allowing request");
                RateDecision {
                    allowed: true,
                    limit: self.policy.limit,
                    remaining: self.policy.limit,
                    reset_at: now + self.policy.window,
                }
            }
        }
    }

    /// Whether the next counted request from `client_id` would be rejected.
    pub fn is_limited(&self, client_id: &str) -> bool {
        self.status(client_id).remaining == 0
    }

    /// Current quota for `client_id` without counting a request.
    pub fn status(&self, client_id: &str) -> RateLimitStatus {
        let now = self.clock.now();
        let open = match self.store.get(client_id) {
            Ok(record) => record.filter(|r| !r.window_elapsed(now)),
            Err(e) => {
                tracing::warn!(client = %client_id, error = %e, "rate limit store lookup failed");
                None
            }
        };

        match open {
            Some(record) => RateLimitStatus {
                limit: self.policy.limit,
                remaining: self.policy.limit.saturating_sub(record.request_count),
                reset_at: Some(record.window_reset_at),
            },
            None => RateLimitStatus {
                limit: self.policy.limit,
                remaining: self.policy.limit,
                reset_at: None,
            },
        }
    }

    /// Drop closed windows. Returns how many records were removed.
    pub fn sweep(&self) -> usize {
        match self.store.purge_expired(self.clock.now()) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "rate limit sweep failed");
                0
            }
        }
    }
}
