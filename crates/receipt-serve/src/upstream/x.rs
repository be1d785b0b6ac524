//! X API v2 client.

use receipt_core::x::{
    self, TWEET_FIELDS, USER_FIELDS, XTrendsResponse, XTweetResponse, XUserResponse,
};
use receipt_core::{PinnedTweet, Trend, XUser};

use super::{UpstreamError, decode, send};

/// Environment variable that holds the X credential.
const CREDENTIAL_VAR: &str = "X_BEARER_TOKEN";

/// Fields requested from the personalized trends endpoint.
const TREND_FIELDS: &str = "category,post_count,trend_name,trending_since";

/// Client for the X API, authenticated with an app bearer token.
#[derive(Clone)]
pub struct XClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl XClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    /// Fail with [`UpstreamError::MissingCredential`] when no token is
    /// configured.
    pub fn require_credential(&self) -> Result<(), UpstreamError> {
        self.token().map(|_| ())
    }

    fn token(&self) -> Result<&str, UpstreamError> {
        self.token
            .as_deref()
            .ok_or(UpstreamError::MissingCredential(CREDENTIAL_VAR))
    }

    /// Fetch a user and its pinned post, normalized.
    ///
    /// X answers unknown or suspended users with `200` and only an `errors`
    /// array; that maps to [`UpstreamError::NotFound`]. A failed pinned post
    /// lookup is logged and the field left out.
    pub async fn fetch_user(&self, username: &str) -> Result<XUser, UpstreamError> {
        let token = self.token()?;
        let subject = format!("X user @{username}");

        let request = self
            .http
            .get(format!("{}/2/users/by/username/{username}", self.base_url))
            .query(&[("user.fields", USER_FIELDS)])
            .bearer_auth(token);

        let body: XUserResponse = decode(send(request, &subject).await?, &subject).await?;

        let Some(payload) = body.data else {
            let details = body
                .errors
                .first()
                .filter(|e| !e.is_not_found())
                .map(|e| e.describe())
                .unwrap_or_else(|| format!("{subject} not found"));
            return Err(UpstreamError::NotFound(details));
        };

        let pinned = match payload.pinned_tweet_id.as_deref() {
            Some(id) => match self.fetch_pinned(id, token).await {
                Ok(pinned) => pinned,
                Err(e) => {
                    tracing::warn!(
                        username = %username,
                        tweet_id = %id,
                        error = %e,
                        "pinned post lookup failed, omitting"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(x::normalize_user(payload, pinned))
    }

    async fn fetch_pinned(
        &self,
        tweet_id: &str,
        token: &str,
    ) -> Result<Option<PinnedTweet>, UpstreamError> {
        let subject = format!("X post {tweet_id}");

        let request = self
            .http
            .get(format!("{}/2/tweets/{tweet_id}", self.base_url))
            .query(&[
                ("tweet.fields", TWEET_FIELDS),
                ("expansions", "attachments.media_keys"),
            ])
            .bearer_auth(token);

        let body: XTweetResponse = decode(send(request, &subject).await?, &subject).await?;
        Ok(body.data.map(x::normalize_pinned))
    }

    /// Fetch the personalized trends for the token's account.
    pub async fn fetch_trends(&self) -> Result<Vec<Trend>, UpstreamError> {
        let token = self.token()?;
        let subject = "X personalized trends";

        let request = self
            .http
            .get(format!("{}/2/users/personalized_trends", self.base_url))
            .query(&[("personalized_trend.fields", TREND_FIELDS)])
            .bearer_auth(token);

        let body: XTrendsResponse = decode(send(request, subject).await?, subject).await?;

        match body.errors.first() {
            Some(err) if body.data.is_empty() => Err(UpstreamError::Unavailable(err.describe())),
            _ => Ok(body.data),
        }
    }
}
