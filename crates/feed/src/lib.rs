//! Calls-for-service feed client.
//!
//! One GET per category against the county's public endpoint. Blocking
//! reqwest client (no Tokio runtime required), retry with backoff, and
//! parsing of the feed's local-time timestamps.

mod client;
mod wire;

pub use client::{FeedClient, FeedError, FeedOptions, DEFAULT_BASE_URL, DEFAULT_REFERER};
pub use wire::{parse_received, FEED_TIME_LAYOUT};
