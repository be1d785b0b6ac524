//! GitHub user payloads and their normalized receipt shape.

use serde::{Deserialize, Serialize};

/// Raw user object from `GET /users/{username}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GithubUserPayload {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub public_repos: Option<u64>,
    #[serde(default)]
    pub followers: Option<u64>,
    #[serde(default)]
    pub following: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Normalized GitHub profile served to clients and stored in the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Fold an upstream GitHub user into the normalized document.
///
/// Empty strings (GitHub sends `""` for an unset blog) are treated as absent.
pub fn normalize_user(payload: GithubUserPayload) -> GithubUser {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    GithubUser {
        html_url: payload
            .html_url
            .unwrap_or_else(|| format!("https://github.com/{}", payload.login)),
        login: payload.login,
        name: non_empty(payload.name),
        avatar_url: non_empty(payload.avatar_url),
        bio: non_empty(payload.bio),
        location: non_empty(payload.location),
        blog: non_empty(payload.blog),
        public_repos: payload.public_repos.unwrap_or(0),
        followers: payload.followers.unwrap_or(0),
        following: payload.following.unwrap_or(0),
        created_at: payload.created_at.unwrap_or_default(),
        updated_at: payload.updated_at.unwrap_or_default(),
    }
}
