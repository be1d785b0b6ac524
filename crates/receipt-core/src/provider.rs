//! Supported upstream providers and their username rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A social platform whose profiles can be turned into receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// X (formerly Twitter).
    X,
    /// GitHub.
    Github,
}

impl Provider {
    /// Path segment and cache-key prefix for this provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Github => "github",
        }
    }

    /// Longest handle the provider allows.
    pub fn max_username_len(self) -> usize {
        match self {
            Self::X => 15,
            Self::Github => 39,
        }
    }

    /// Validate a username from the request path and return its trimmed form.
    ///
    /// A leading `@` is accepted and dropped. Case is preserved here; cache
    /// keys do their own lowercasing.
    pub fn parse_username(self, raw: &str) -> Result<String> {
        let username = raw.trim();
        let username = username.strip_prefix('@').unwrap_or(username);

        let invalid = |reason| Error::InvalidUsername {
            provider: self.as_str(),
            username: username.to_string(),
            reason,
        };

        if username.is_empty() {
            return Err(invalid("username is empty"));
        }
        if username.len() > self.max_username_len() {
            return Err(invalid("username is too long"));
        }

        match self {
            Self::X => {
                if !username
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(invalid("only letters, digits and underscores are allowed"));
                }
            }
            Self::Github => {
                if !username
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
                {
                    return Err(invalid("only letters, digits and hyphens are allowed"));
                }
                if username.starts_with('-') || username.ends_with('-') {
                    return Err(invalid("username cannot start or end with a hyphen"));
                }
            }
        }

        Ok(username.to_string())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x" | "twitter" => Ok(Self::X),
            "github" => Ok(Self::Github),
            _ => Err(Error::UnknownProvider(s.to_string())),
        }
    }
}
