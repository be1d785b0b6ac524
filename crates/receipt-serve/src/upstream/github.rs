//! GitHub REST client.

use receipt_core::GithubUser;
use receipt_core::github::{self, GithubUserPayload};

use super::{UpstreamError, decode, send};

/// Client for the GitHub users API. The token is optional; anonymous calls
/// share GitHub's lower per-IP quota.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    pub async fn fetch_user(&self, username: &str) -> Result<GithubUser, UpstreamError> {
        let subject = format!("GitHub user {username}");

        let mut request = self
            .http
            .get(format!("{}/users/{username}", self.base_url))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("x-github-api-version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let payload: GithubUserPayload = decode(send(request, &subject).await?, &subject).await?;
        Ok(github::normalize_user(payload))
    }
}
