//! Error types for profile parsing and validation.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating client input or decoding documents.
#[derive(Error, Debug)]
pub enum Error {
    /// The provider path segment is not one we proxy.
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    /// The username does not match the provider's handle rules.
    #[error("invalid {provider} username '{username}': {reason}")]
    InvalidUsername {
        /// Provider whose rules were applied.
        provider: &'static str,
        /// The rejected input (after trimming).
        username: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A cached or upstream document does not have the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
