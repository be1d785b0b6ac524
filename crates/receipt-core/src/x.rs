//! X API v2 payloads and their normalized receipt shape.
//!
//! Upstream responses are decoded leniently (`Option` everywhere, counts
//! default to zero) and then folded into [`XUser`], the document the proxy
//! caches and serves. Clients rely on the normalized shape only.

use serde::{Deserialize, Deserializer, Serialize};

/// Fields requested from `GET /2/users/by/username/{username}`.
pub const USER_FIELDS: &str = "created_at,description,entities,location,pinned_tweet_id,\
profile_image_url,protected,public_metrics,url,verified_type";

/// Fields requested from `GET /2/tweets/{id}` for the pinned post.
pub const TWEET_FIELDS: &str = "created_at,public_metrics,attachments";

/// Suffix X appends to the 48x48 avatar variant.
const LOW_RES_SUFFIX: &str = "_normal";

// ═══════════════════════════════════════════════════════════════════════════
// Upstream payloads
// ═══════════════════════════════════════════════════════════════════════════

/// Envelope of a user lookup. X answers unknown users with `200` and an
/// `errors` array instead of a 404.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XUserResponse {
    #[serde(default)]
    pub data: Option<XUserPayload>,
    #[serde(default)]
    pub errors: Vec<XApiError>,
}

/// Envelope of a single post lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XTweetResponse {
    #[serde(default)]
    pub data: Option<XTweetPayload>,
    #[serde(default)]
    pub errors: Vec<XApiError>,
}

/// Envelope of the personalized trends endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XTrendsResponse {
    #[serde(default)]
    pub data: Vec<Trend>,
    #[serde(default)]
    pub errors: Vec<XApiError>,
}

/// A problem entry inside an X response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XApiError {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl XApiError {
    /// Whether this entry reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        self.title.as_deref() == Some("Not Found Error")
            || self
                .kind
                .as_deref()
                .is_some_and(|t| t.ends_with("/resource-not-found"))
    }

    /// Best human-readable description of the problem.
    pub fn describe(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "unknown X API error".to_string())
    }
}

/// Raw user object as returned by X.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XUserPayload {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub entities: Option<serde_json::Value>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub pinned_tweet_id: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub public_metrics: Option<PublicMetrics>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub verified_type: Option<VerifiedType>,
}

/// Raw post object as returned by X.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XTweetPayload {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub public_metrics: Option<TweetMetrics>,
    #[serde(default)]
    pub attachments: Option<TweetAttachments>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetMetrics {
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub like_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetAttachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Normalized document
// ═══════════════════════════════════════════════════════════════════════════

/// Verification badge shown on the receipt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifiedType {
    Blue,
    Business,
    Government,
    #[default]
    #[serde(other)]
    None,
}

impl VerifiedType {
    /// Receipt label for the badge.
    pub fn label(self) -> &'static str {
        match self {
            Self::Blue => "Blue",
            Self::Business => "Business",
            Self::Government => "Government",
            Self::None => "No",
        }
    }
}

/// Account counters. Missing upstream values become zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub tweet_count: u64,
    #[serde(default)]
    pub listed_count: u64,
    #[serde(default)]
    pub like_count: u64,
}

/// Media attachment reference on a pinned post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub key: String,
}

/// Summary of the account's pinned post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedTweet {
    pub text: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaRef>>,
}

/// Normalized X profile served to clients and stored in the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XUser {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_tweet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_tweet: Option<PinnedTweet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub verified_type: VerifiedType,
}

impl XUser {
    /// Link printed on the receipt: the first expanded profile URL, then the
    /// raw `url` field, then the profile page itself.
    pub fn profile_url(&self) -> String {
        self.entities
            .as_ref()
            .and_then(|e| e.pointer("/url/urls/0/expanded_url"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| self.url.clone().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| format!("https://x.com/{}", self.username))
    }
}

/// A trending topic from the personalized trends endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trend {
    pub trend_name: String,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub post_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending_since: Option<String>,
}

/// X reports `post_count` either as a number or as display text ("12K posts").
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Normalization
// ═══════════════════════════════════════════════════════════════════════════

/// Replace the low resolution avatar variant with the original upload.
///
/// `.../abc_normal.jpg` becomes `.../abc.jpg`; other URLs pass through.
pub fn full_size_image_url(url: &str) -> String {
    let (stem, ext) = match url.rfind('.') {
        Some(dot) if dot > url.rfind('/').unwrap_or(0) => url.split_at(dot),
        _ => (url, ""),
    };
    match stem.strip_suffix(LOW_RES_SUFFIX) {
        Some(base) => format!("{base}{ext}"),
        None => url.to_string(),
    }
}

/// Fold an upstream user object (and its resolved pinned post) into the
/// normalized document.
pub fn normalize_user(payload: XUserPayload, pinned: Option<PinnedTweet>) -> XUser {
    XUser {
        id: payload.id,
        name: payload.name,
        username: payload.username,
        created_at: payload.created_at.unwrap_or_default(),
        description: payload.description,
        entities: payload.entities,
        location: payload.location.filter(|l| !l.is_empty()),
        pinned_tweet: pinned.filter(|_| payload.pinned_tweet_id.is_some()),
        pinned_tweet_id: payload.pinned_tweet_id,
        profile_image_url: payload
            .profile_image_url
            .as_deref()
            .map(full_size_image_url),
        protected: payload.protected,
        public_metrics: payload.public_metrics.unwrap_or_default(),
        url: payload.url,
        verified_type: payload.verified_type.unwrap_or_default(),
    }
}

/// Reduce an upstream post to the pinned post summary.
pub fn normalize_pinned(payload: XTweetPayload) -> PinnedTweet {
    let metrics = payload.public_metrics.unwrap_or_default();
    let media = payload
        .attachments
        .map(|a| a.media_keys)
        .filter(|keys| !keys.is_empty())
        .map(|keys| keys.into_iter().map(|key| MediaRef { key }).collect());

    PinnedTweet {
        text: payload.text,
        created_at: payload.created_at.unwrap_or_default(),
        retweet_count: metrics.retweet_count,
        reply_count: metrics.reply_count,
        like_count: metrics.like_count,
        media,
    }
}
