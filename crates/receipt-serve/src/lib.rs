//! Receipt Serve - HTTP proxy for social profile receipts
//!
//! This crate proxies public profile lookups for X and GitHub, caches the
//! normalized documents, and enforces a per-client quota on lookups that
//! reach upstream. Receipts can be fetched as JSON or rendered server-side
//! as SVG/PNG.
//!
//! # Architecture
//!
//! - **AppState**: Shared state (configuration, cache, limiter, clients)
//! - **Cache**: TTL cache over a pluggable store with per-key fill locks
//! - **RateLimiter**: Fixed-window counter per client, fails open
//! - **Upstream**: X and GitHub clients mapping statuses to one error taxonomy
//! - **Routes**: Endpoint handlers

pub mod cache;
mod client_id;
pub mod clock;
mod config;
mod error;
mod proxy;
pub mod ratelimit;
pub mod render;
mod routes;
mod state;
pub mod store;
pub mod upstream;

pub use self::client_id::ClientId;
pub use self::config::Config;
pub use self::error::ApiError;
pub use self::routes::router;
pub use self::state::AppState;
