//! Testing utilities: a mock upstream API and fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use channelscout_core::testing::{fixtures, MockDiscoveryApi};
//!
//! let api = MockDiscoveryApi::new();
//! api.add_search_page("robotics", vec![fixtures::search_item("UC1")]).await;
//! api.add_channel(fixtures::channel("UC1", 5000)).await;
//!
//! // Drive the pipeline, then assert on call counts
//! assert_eq!(api.call_counts().await.recent_uploads, 0);
//! ```

mod mock_discovery;

pub use mock_discovery::{CallCounts, MockDiscoveryApi};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Utc};

    use crate::discovery::{ChannelDetails, SearchItem, UploadSummary};

    pub fn search_item(id: &str) -> SearchItem {
        SearchItem {
            id: id.to_string(),
            title: format!("Channel {}", id),
            snippet_text: String::new(),
        }
    }

    /// English channel with an e-mail contact and an upload list `UU<id>`.
    pub fn channel(id: &str, subscriber_count: u64) -> ChannelDetails {
        ChannelDetails {
            id: id.to_string(),
            title: format!("Channel {}", id),
            description: format!("Business inquiries: {}@example.com", id.to_lowercase()),
            subscriber_count,
            language_hint: Some("en".to_string()),
            uploads_playlist_id: Some(uploads_playlist(id)),
        }
    }

    pub fn uploads_playlist(channel_id: &str) -> String {
        format!("UU{}", channel_id)
    }

    pub fn upload(video_id: &str, title: &str, published_at: DateTime<Utc>) -> UploadSummary {
        UploadSummary {
            video_id: video_id.to_string(),
            title: title.to_string(),
            description: String::new(),
            published_at: Some(published_at),
        }
    }

    /// `total` uploads one day apart, newest first. The first `shorts` are
    /// tagged short-form.
    pub fn upload_series(
        channel_id: &str,
        total: usize,
        shorts: usize,
        newest: DateTime<Utc>,
    ) -> Vec<UploadSummary> {
        (0..total)
            .map(|i| {
                let title = if i < shorts {
                    format!("Clip {} #shorts", i)
                } else {
                    format!("Episode {}", i)
                };
                upload(
                    &format!("{}-v{}", channel_id, i),
                    &title,
                    newest - chrono::Duration::days(i as i64),
                )
            })
            .collect()
    }
}
