//! A small client for the YouTube Data API v3.
//!
//! Only the endpoints a live chat bot needs are covered: finding a channel's live broadcast,
//! looking up a video's live streaming details, and listing, inserting, and deleting live chat
//! messages.
//!
//! # Authentication
//!
//! Every read can be done with just an API key. Inserting and deleting chat messages act on
//! behalf of a user and need an OAuth token (see [`crate::oauth`]), which is handed to the
//! client with [`YouTubeClient::set_token`].
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use chatto::youtube_api::YouTubeClient;
//! use tokio_stream::StreamExt;
//!
//! # async fn example() -> eyre::Result<()> {
//! let client = YouTubeClient::new(
//!     "my-api-key",
//!     chatto::config::YOUTUBE_API_BASE_URL,
//!     reqwest::Client::new(),
//! );
//!
//! let video_id = client.search_live_video("UC4R8DWoMoI7CAwX8_LjQHig").await?;
//! let video = client.get_video(&video_id).await?;
//! let chat_id = video
//!     .live_streaming_details
//!     .and_then(|d| d.active_live_chat_id)
//!     .expect("live video has a chat");
//!
//! let polls = client.poll_live_chat(&chat_id, jiff::Timestamp::now(), std::time::Duration::from_secs(5));
//! let mut polls = std::pin::pin!(polls);
//! while let Some(poll) = polls.next().await {
//!     for message in poll?.messages {
//!         println!("{}", message.snippet.display_message.unwrap_or_default());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod client;
pub mod search;
pub mod types;
pub mod videos;

pub use client::{TimeBoundAccessToken, YouTubeClient};
pub use types::PageInfo;

pub use chat::{
    ChatPoll, GiftMembershipReceivedDetails, LiveChatMessage, LiveChatMessageAuthor,
    LiveChatMessageDetails, LiveChatMessageListResponse, LiveChatMessageSnippet, LiveChatPoller,
    MemberMilestoneChatDetails, MembershipGiftingDetails, MessageDeletedDetails,
    NewSponsorDetails, SnippetDetails, SuperChatDetails, SuperStickerDetails, TextMessageDetails,
    UserBannedDetails,
};

pub use videos::{LiveStreamingDetails, Video};
