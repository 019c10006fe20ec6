//! Upstream video-platform discovery API.
//!
//! This module provides a `DiscoveryApi` trait covering the call shapes the
//! pipeline consumes (paginated channel search, batched channel lookup,
//! recent uploads, batched duration lookup) and a YouTube Data API v3
//! implementation.

mod types;
mod youtube;

pub use types::*;
pub use youtube::{parse_iso8601_duration, YouTubeClient};
