//! The live broadcast a bot is attached to.

use crate::error::ChattoError;
use crate::youtube_api::{Video, YouTubeClient};
use eyre::Context;
use jiff::Timestamp;
use tracing::instrument;

/// A live broadcast with an active chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stream {
    /// The video ID of the broadcast.
    pub id: String,
    /// The ID of the broadcast's live chat.
    pub chat_id: String,
    /// When the broadcast actually started.
    pub start_time: Timestamp,
}

impl Stream {
    /// Builds a stream from a `video` resource fetched with the `liveStreamingDetails` part.
    ///
    /// Fails with [`ChattoError::ChannelNotLive`] if the video has no active chat, which is the
    /// case for upcoming and finished broadcasts as well as regular videos.
    pub fn from_video(video: Video) -> eyre::Result<Self> {
        let details = video.live_streaming_details.unwrap_or_default();
        let (Some(chat_id), Some(start_time)) =
            (details.active_live_chat_id, details.actual_start_time)
        else {
            return Err(ChattoError::ChannelNotLive(
                "the stream has no active chat ID".to_string(),
            )
            .into());
        };

        tracing::info!(stream_id = %video.id, "retrieved stream info");
        Ok(Self {
            id: video.id,
            chat_id,
            start_time,
        })
    }

    /// Fetches the stream for a known video ID.
    #[instrument(skip(client))]
    pub async fn fetch(client: &YouTubeClient, stream_id: &str) -> eyre::Result<Self> {
        let video = client
            .get_video(stream_id)
            .await
            .context("fetch stream video")?;
        Self::from_video(video)
    }

    /// Fetches whatever stream is currently live on a channel.
    #[instrument(skip(client))]
    pub async fn fetch_active(client: &YouTubeClient, channel_id: &str) -> eyre::Result<Self> {
        let stream_id = client
            .search_live_video(channel_id)
            .await
            .context("search for live stream")?;
        tracing::info!(%stream_id, "retrieved ID of currently live stream");
        Self::fetch(client, &stream_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn video(details: serde_json::Value) -> Video {
        serde_json::from_value(serde_json::json!({
            "id": "437n439gn84ng89h430g49bg",
            "liveStreamingDetails": details,
        }))
        .unwrap()
    }

    #[test]
    fn from_live_video() {
        let stream = Stream::from_video(video(serde_json::json!({
            "actualStartTime": "2022-01-01T00:00:00Z",
            "activeLiveChatId": "tn389nt9832nbt8932nty80b3982yb"
        })))
        .unwrap();

        assert_eq!(
            stream,
            Stream {
                id: "437n439gn84ng89h430g49bg".to_string(),
                chat_id: "tn389nt9832nbt8932nty80b3982yb".to_string(),
                start_time: "2022-01-01T00:00:00Z".parse().unwrap(),
            }
        );
    }

    #[test]
    fn without_chat_id() {
        let err = Stream::from_video(video(serde_json::json!({
            "actualStartTime": "2022-01-01T00:00:00Z"
        })))
        .unwrap_err();
        insta::assert_snapshot!(err, @"the stream has no active chat ID");
        assert!(matches!(
            ChattoError::find(&err),
            Some(ChattoError::ChannelNotLive(_))
        ));
    }

    #[test]
    fn not_started() {
        let err = Stream::from_video(video(serde_json::json!({
            "scheduledStartTime": "2099-01-01T00:00:00Z",
            "activeLiveChatId": "tn389nt9832nbt8932nty80b3982yb"
        })))
        .unwrap_err();
        insta::assert_snapshot!(err, @"the stream has no active chat ID");
    }

    #[test]
    fn regular_video() {
        let video: Video = serde_json::from_value(serde_json::json!({ "id": "dQw4w9WgXcQ" })).unwrap();
        assert!(Stream::from_video(video).is_err());
    }
}
