//! YouTube Live Chat API types and polling.

use crate::error::ChattoError;
use crate::youtube_api::client::YouTubeClient;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_stream::Stream;

/// How long to wait between polls when the API does not say.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// Response structure for the `liveChatMessages.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/list>
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageListResponse {
    /// Chat messages, oldest first.
    #[serde(default)]
    pub items: Vec<LiveChatMessage>,
    /// Token to pass as `pageToken` to only get messages after this page.
    pub next_page_token: Option<String>,
    /// How long to wait before polling again.
    pub polling_interval_millis: Option<u64>,
    /// When the underlying broadcast went offline. Absent while it is live.
    pub offline_at: Option<Timestamp>,
}

impl LiveChatMessageListResponse {
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval_millis
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLLING_INTERVAL)
    }
}

/// A `liveChatMessage` resource.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessage {
    /// The ID that YouTube assigns to uniquely identify the message.
    pub id: String,
    pub snippet: LiveChatMessageSnippet,
    /// Not included in the response to an insert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_details: Option<LiveChatMessageAuthor>,
}

impl LiveChatMessage {
    /// Whether this message marks the end of the chat.
    pub fn is_chat_end(&self) -> bool {
        matches!(
            self.snippet.details,
            SnippetDetails::Known(LiveChatMessageDetails::ChatEnded)
        )
    }
}

/// Basic details about the chat message.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#snippet>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageSnippet {
    pub live_chat_id: String,
    pub author_channel_id: String,
    pub published_at: Timestamp,
    /// Text that can be displayed to the user.
    ///
    /// Missing for some system messages such as `chatEndedEvent`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_message: Option<String>,
    #[serde(flatten)]
    pub details: SnippetDetails,
}

/// The `type` of a message together with its type-specific details.
///
/// YouTube adds new message types from time to time, so types this crate does not know about
/// are kept by name rather than failing the whole page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnippetDetails {
    Known(LiveChatMessageDetails),
    Unknown {
        #[serde(rename = "type")]
        kind: String,
    },
}

impl SnippetDetails {
    /// The wire name of the message type, such as `textMessageEvent`.
    pub fn kind(&self) -> &str {
        match self {
            Self::Known(details) => details.kind(),
            Self::Unknown { kind } => kind,
        }
    }
}

/// Type-specific details for live chat messages, tagged by `snippet.type`.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#snippet.type>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LiveChatMessageDetails {
    /// A regular chat message posted by a viewer.
    #[serde(rename = "textMessageEvent", rename_all = "camelCase")]
    TextMessage {
        text_message_details: TextMessageDetails,
    },
    /// A paid, highlighted message.
    #[serde(rename = "superChatEvent", rename_all = "camelCase")]
    SuperChat {
        super_chat_details: SuperChatDetails,
    },
    /// A paid animated sticker.
    #[serde(rename = "superStickerEvent", rename_all = "camelCase")]
    SuperSticker {
        super_sticker_details: SuperStickerDetails,
    },
    /// A viewer joined or upgraded their channel membership.
    #[serde(rename = "newSponsorEvent", rename_all = "camelCase")]
    NewSponsor {
        new_sponsor_details: NewSponsorDetails,
    },
    #[serde(rename = "memberMilestoneChatEvent", rename_all = "camelCase")]
    MemberMilestone {
        member_milestone_chat_details: MemberMilestoneChatDetails,
    },
    /// A viewer bought memberships for others. Each recipient gets a
    /// `giftMembershipReceivedEvent` of their own.
    #[serde(rename = "membershipGiftingEvent", rename_all = "camelCase")]
    MembershipGifting {
        membership_gifting_details: MembershipGiftingDetails,
    },
    #[serde(rename = "giftMembershipReceivedEvent", rename_all = "camelCase")]
    GiftMembershipReceived {
        gift_membership_received_details: GiftMembershipReceivedDetails,
    },
    /// A moderator deleted an earlier message.
    #[serde(rename = "messageDeletedEvent", rename_all = "camelCase")]
    MessageDeleted {
        message_deleted_details: MessageDeletedDetails,
    },
    #[serde(rename = "userBannedEvent", rename_all = "camelCase")]
    UserBanned {
        user_banned_details: UserBannedDetails,
    },
    /// An author took back their own message.
    #[serde(rename = "messageRetractedEvent")]
    MessageRetracted,
    /// The broadcaster closed the chat. Nothing can be posted after this.
    #[serde(rename = "chatEndedEvent")]
    ChatEnded,
    #[serde(rename = "sponsorOnlyModeStartedEvent")]
    SponsorOnlyModeStarted,
    #[serde(rename = "sponsorOnlyModeEndedEvent")]
    SponsorOnlyModeEnded,
}

impl LiveChatMessageDetails {
    /// The wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextMessage { .. } => "textMessageEvent",
            Self::SuperChat { .. } => "superChatEvent",
            Self::SuperSticker { .. } => "superStickerEvent",
            Self::NewSponsor { .. } => "newSponsorEvent",
            Self::MemberMilestone { .. } => "memberMilestoneChatEvent",
            Self::MembershipGifting { .. } => "membershipGiftingEvent",
            Self::GiftMembershipReceived { .. } => "giftMembershipReceivedEvent",
            Self::MessageDeleted { .. } => "messageDeletedEvent",
            Self::UserBanned { .. } => "userBannedEvent",
            Self::MessageRetracted => "messageRetractedEvent",
            Self::ChatEnded => "chatEndedEvent",
            Self::SponsorOnlyModeStarted => "sponsorOnlyModeStartedEvent",
            Self::SponsorOnlyModeEnded => "sponsorOnlyModeEndedEvent",
        }
    }
}

impl fmt::Display for LiveChatMessageDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Details about the author of a live chat message.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#authorDetails>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageAuthor {
    pub channel_id: String,
    pub channel_url: String,
    /// The channel name at the time the message was sent.
    pub display_name: String,
    pub profile_image_url: String,
    pub is_verified: bool,
    /// Whether the author is the channel hosting the stream.
    pub is_chat_owner: bool,
    /// Whether the author is a channel member.
    pub is_chat_sponsor: bool,
    pub is_chat_moderator: bool,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#snippet.superChatDetails>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperChatDetails {
    /// Localized purchase amount, like `$5.00`.
    pub amount_display_string: String,
    /// The purchase amount in millionths of the currency unit.
    pub amount_micros: String,
    /// ISO 4217 currency code.
    pub currency: String,
    pub tier: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_comment: Option<String>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#snippet.superStickerDetails>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperStickerDetails {
    pub amount_display_string: String,
    pub amount_micros: String,
    pub currency: String,
    pub tier: u32,
    pub super_sticker_metadata: SuperStickerMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperStickerMetadata {
    pub sticker_id: String,
    /// Accessible description of the sticker.
    pub alt_text: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageDetails {
    /// The message as typed, without display formatting.
    pub message_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberMilestoneChatDetails {
    pub user_comment: Option<String>,
    pub member_month: u32,
    pub member_level_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSponsorDetails {
    pub member_level_name: String,
    /// `false` for a first-time member.
    pub is_upgrade: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBannedDetails {
    pub banned_user_details: BannedUserDetails,
    /// `permanent` or `temporary`.
    pub ban_type: String,
    /// Only set for temporary bans.
    pub ban_duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedUserDetails {
    pub channel_id: String,
    pub channel_url: String,
    pub display_name: String,
    pub profile_image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipGiftingDetails {
    pub gift_memberships_count: u32,
    pub gift_memberships_level_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftMembershipReceivedDetails {
    pub member_level_name: String,
    pub gifter_channel_id: String,
    /// Links back to the `membershipGiftingEvent` this gift came from.
    pub associated_membership_gifting_message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedDetails {
    pub deleted_message_id: String,
}

/// Request body for `liveChatMessages.insert`.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/insert>
#[derive(Debug, Serialize)]
pub struct LiveChatMessageInsert {
    snippet: LiveChatMessageInsertSnippet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatMessageInsertSnippet {
    live_chat_id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    text_message_details: TextMessageDetails,
}

impl LiveChatMessageInsert {
    /// A plain text message for the given chat.
    pub fn text(live_chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            snippet: LiveChatMessageInsertSnippet {
                live_chat_id: live_chat_id.into(),
                kind: "textMessageEvent",
                text_message_details: TextMessageDetails {
                    message_text: text.into(),
                },
            },
        }
    }
}

/// The outcome of one successful poll of a live chat.
#[derive(Debug, Clone)]
pub struct ChatPoll {
    /// Messages not seen by any earlier poll, oldest first.
    pub messages: Vec<LiveChatMessage>,
    /// How long the poller will wait before asking again.
    pub next_poll_in: Duration,
    /// Whether the chat is over, either through a `chatEndedEvent` or the broadcast going offline.
    pub ended: bool,
}

/// Repeatedly lists the messages of a live chat, only yielding ones that are new.
///
/// Messages published at or before `since` are never yielded, so a poller started with the
/// current time skips the chat's backlog.
#[derive(Debug, Clone)]
pub struct LiveChatPoller {
    client: YouTubeClient,
    live_chat_id: String,
    since: Timestamp,
    retry_delay: Duration,
}

impl LiveChatPoller {
    pub fn new(
        client: YouTubeClient,
        live_chat_id: impl Into<String>,
        since: Timestamp,
        retry_delay: Duration,
    ) -> Self {
        Self {
            client,
            live_chat_id: live_chat_id.into(),
            since,
            retry_delay,
        }
    }

    /// Turns the poller into a stream of poll results.
    ///
    /// The stream sleeps between polls for as long as the API asks it to. Errors are yielded as
    /// they happen. After a fatal error (see [`ChattoError::is_fatal`]) the stream ends, otherwise
    /// it retries after the retry delay. The stream also ends after yielding a batch with
    /// [`ChatPoll::ended`] set.
    pub fn into_stream(self) -> impl Stream<Item = eyre::Result<ChatPoll>> + Send {
        let Self {
            client,
            live_chat_id,
            since,
            retry_delay,
        } = self;

        async_stream::stream! {
            let mut last_seen = since;
            let mut page_token: Option<String> = None;
            loop {
                let response = match client
                    .list_live_chat_messages(&live_chat_id, page_token.as_deref())
                    .await
                {
                    Ok(response) => response,
                    Err(e) => {
                        let fatal = ChattoError::find(&e).is_some_and(ChattoError::is_fatal);
                        yield Err(e);
                        if fatal {
                            tracing::error!(live_chat_id = %live_chat_id, "fatal error while polling chat");
                            break;
                        }
                        tracing::debug!(?retry_delay, "retrying poll");
                        tokio::time::sleep(retry_delay).await;
                        continue;
                    }
                };

                let next_poll_in = response.polling_interval();
                let offline = response.offline_at.is_some();
                let messages: Vec<_> = response
                    .items
                    .into_iter()
                    .filter(|m| m.snippet.published_at > last_seen)
                    .collect();
                if let Some(newest) = messages.iter().map(|m| m.snippet.published_at).max() {
                    last_seen = newest;
                }
                let ended = offline || messages.iter().any(LiveChatMessage::is_chat_end);

                tracing::trace!(
                    live_chat_id = %live_chat_id,
                    new_messages = messages.len(),
                    ?next_poll_in,
                    ended,
                    "polled live chat"
                );
                yield Ok(ChatPoll { messages, next_poll_in, ended });
                if ended {
                    break;
                }

                if response.next_page_token.is_some() {
                    page_token = response.next_page_token;
                }
                tokio::time::sleep(next_poll_in).await;
            }
        }
    }
}
