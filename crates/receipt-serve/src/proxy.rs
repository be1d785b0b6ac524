//! Profile lookup flow shared by the JSON and receipt endpoints.
//!
//! `validate → cache check → fill lock → re-check → credential → limiter →
//! upstream → normalize → store`. Cache hits return before the limiter, so
//! only requests that reach upstream count against a client's quota.

use chrono::{DateTime, Utc};
use receipt_core::Provider;
use serde_json::Value;

use crate::cache::CacheOutcome;
use crate::client_id::ClientId;
use crate::error::ApiError;
use crate::ratelimit::RateDecision;
use crate::state::AppState;
use crate::store::CacheKey;

/// Result of a profile or trends lookup.
#[derive(Debug, Clone)]
pub struct Lookup {
    /// Normalized document as cached.
    pub document: Value,
    /// When the document was fetched from upstream.
    pub cached_at: DateTime<Utc>,
    pub cache_hit: bool,
    /// Quota after this request; `None` when it was not counted.
    pub rate: Option<RateDecision>,
}

impl<T> From<CacheOutcome<T>> for Lookup
where
    T: Into<Option<RateDecision>>,
{
    fn from(outcome: CacheOutcome<T>) -> Self {
        match outcome {
            CacheOutcome::Hit(entry) => Self {
                document: entry.document,
                cached_at: entry.cached_at,
                cache_hit: true,
                rate: None,
            },
            CacheOutcome::Filled { entry, extra } => Self {
                document: entry.document,
                cached_at: entry.cached_at,
                cache_hit: false,
                rate: extra.into(),
            },
        }
    }
}

/// Look up a user profile.
///
/// `raw_username` is validated first; invalid input never touches the cache,
/// the limiter or upstream. With `bypass` set the cache read is skipped but
/// the fresh result is still stored.
pub async fn lookup_profile(
    state: &AppState,
    provider: Provider,
    raw_username: &str,
    client: &ClientId,
    bypass: bool,
) -> Result<Lookup, ApiError> {
    let username = provider.parse_username(raw_username)?;
    let key = CacheKey::profile(provider, &username);

    let outcome = state
        .cache
        .get_or_fill(&key, state.config.profile_ttl, bypass, || async {
            if provider == Provider::X {
                state.x.require_credential().map_err(ApiError::from)?;
            }

            let decision = state.limiter.record_and_check(client.as_str());
            if !decision.allowed {
                return Err(ApiError::RateLimitExceeded {
                    limit: decision.limit,
                    reset_at: decision.reset_at,
                });
            }

            let document = match provider {
                Provider::X => serde_json::to_value(state.x.fetch_user(&username).await?),
                Provider::Github => serde_json::to_value(state.github.fetch_user(&username).await?),
            }
            .map_err(|e| ApiError::Internal(e.into()))?;

            tracing::info!(
                provider = %provider,
                username = %username,
                client = %client,
                remaining = decision.remaining,
                "profile fetched from upstream"
            );

            Ok::<_, ApiError>((document, decision))
        })
        .await?;

    Ok(outcome.into())
}

/// Look up the personalized X trends. Not counted against the receipt quota.
pub async fn lookup_trends(state: &AppState) -> Result<Lookup, ApiError> {
    let key = CacheKey::trends(Provider::X);

    let outcome = state
        .cache
        .get_or_fill(&key, state.config.trends_ttl, false, || async {
            let trends = state.x.fetch_trends().await?;
            tracing::info!(count = trends.len(), "trends fetched from upstream");

            let document =
                serde_json::to_value(trends).map_err(|e| ApiError::Internal(e.into()))?;
            Ok::<_, ApiError>((serde_json::json!({ "data": document }), None::<RateDecision>))
        })
        .await?;

    Ok(outcome.into())
}
