//! Core types for the receipt proxy.
//!
//! This crate provides:
//! - Provider and username parsing
//! - Upstream payload shapes for X and GitHub
//! - Normalization into the canonical profile documents served to clients
//! - Receipt layout (labelled lines) independent of any renderer
//!
//! Nothing here performs I/O.

mod error;
pub mod github;
mod profile;
mod provider;
pub mod receipt;
pub mod x;

pub use error::{Error, Result};
pub use github::GithubUser;
pub use profile::Profile;
pub use provider::Provider;
pub use receipt::{Receipt, ReceiptLine, Section};
pub use x::{PinnedTweet, PublicMetrics, Trend, VerifiedType, XUser};
