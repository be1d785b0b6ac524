//! Provider-tagged view over cached profile documents.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::github::GithubUser;
use crate::provider::Provider;
use crate::x::XUser;

/// A normalized profile from any supported provider.
///
/// Serializes without a tag so the wire shape is exactly the provider's
/// normalized document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Profile {
    X(XUser),
    Github(GithubUser),
}

impl Profile {
    /// Decode an opaque cached document for the given provider.
    pub fn from_document(provider: Provider, document: &serde_json::Value) -> Result<Self> {
        Ok(match provider {
            Provider::X => Self::X(XUser::deserialize(document)?),
            Provider::Github => Self::Github(GithubUser::deserialize(document)?),
        })
    }

    /// Encode as the opaque document stored in the cache.
    pub fn to_document(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn provider(&self) -> Provider {
        match self {
            Self::X(_) => Provider::X,
            Self::Github(_) => Provider::Github,
        }
    }

    /// Handle as shown by the provider.
    pub fn username(&self) -> &str {
        match self {
            Self::X(user) => &user.username,
            Self::Github(user) => &user.login,
        }
    }
}
