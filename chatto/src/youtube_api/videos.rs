//! YouTube Videos API types.

use crate::youtube_api::types::PageInfo;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Response structure for the `videos.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/list>
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListResponse {
    /// A list of videos that match the request criteria.
    #[serde(default)]
    pub items: Vec<Video>,
    pub page_info: Option<PageInfo>,
}

/// A `video` resource, limited to the parts a chat bot asks for.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
    /// Only present for videos that are, were, or will be live broadcasts.
    pub live_streaming_details: Option<LiveStreamingDetails>,
}

/// Metadata about a live video broadcast.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#liveStreamingDetails>
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamingDetails {
    /// When the broadcast actually started. Absent until it has.
    pub actual_start_time: Option<Timestamp>,
    /// When the broadcast actually ended. Absent until it has.
    pub actual_end_time: Option<Timestamp>,
    pub scheduled_start_time: Option<Timestamp>,
    /// The number of viewers currently watching, as a decimal string.
    pub concurrent_viewers: Option<String>,
    /// The ID of the currently active live chat. Only present while the broadcast is live.
    pub active_live_chat_id: Option<String>,
}
