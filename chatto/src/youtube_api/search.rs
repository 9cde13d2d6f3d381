//! YouTube Search API types.

use crate::youtube_api::types::PageInfo;
use serde::{Deserialize, Serialize};

/// Response structure for the `search.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/search/list>
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
    pub page_info: Option<PageInfo>,
}

/// A single search hit. Only the `id` part is ever requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: ResourceId,
}

/// Identifies the resource a search result refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    /// The type of the resource, such as `youtube#video`.
    pub kind: String,
    /// Set when `kind` is `youtube#video`.
    pub video_id: Option<String>,
}
