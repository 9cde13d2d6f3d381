//! Chat messages as handed to event callbacks.

use crate::channel::Channel;
use crate::stream::Stream;
use crate::youtube_api::LiveChatMessage;
use jiff::Timestamp;
use std::fmt;

/// The kind of a chat message, as given by `snippet.type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    ChatEnded,
    MessageDeleted,
    MessageRetracted,
    NewSponsor,
    SponsorOnlyModeEnded,
    SponsorOnlyModeStarted,
    MemberMilestoneChat,
    MembershipGifting,
    GiftMembershipReceived,
    SuperChat,
    SuperSticker,
    TextMessage,
    Tombstone,
    UserBanned,
    /// A type YouTube introduced after this crate was written.
    Other(String),
}

impl MessageType {
    /// The wire name of the type, such as `textMessageEvent`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ChatEnded => "chatEndedEvent",
            Self::MessageDeleted => "messageDeletedEvent",
            Self::MessageRetracted => "messageRetractedEvent",
            Self::NewSponsor => "newSponsorEvent",
            Self::SponsorOnlyModeEnded => "sponsorOnlyModeEndedEvent",
            Self::SponsorOnlyModeStarted => "sponsorOnlyModeStartedEvent",
            Self::MemberMilestoneChat => "memberMilestoneChatEvent",
            Self::MembershipGifting => "membershipGiftingEvent",
            Self::GiftMembershipReceived => "giftMembershipReceivedEvent",
            Self::SuperChat => "superChatEvent",
            Self::SuperSticker => "superStickerEvent",
            Self::TextMessage => "textMessageEvent",
            Self::Tombstone => "tombstone",
            Self::UserBanned => "userBannedEvent",
            Self::Other(kind) => kind,
        }
    }
}

impl From<&str> for MessageType {
    fn from(kind: &str) -> Self {
        match kind {
            "chatEndedEvent" => Self::ChatEnded,
            "messageDeletedEvent" => Self::MessageDeleted,
            "messageRetractedEvent" => Self::MessageRetracted,
            "newSponsorEvent" => Self::NewSponsor,
            "sponsorOnlyModeEndedEvent" => Self::SponsorOnlyModeEnded,
            "sponsorOnlyModeStartedEvent" => Self::SponsorOnlyModeStarted,
            "memberMilestoneChatEvent" => Self::MemberMilestoneChat,
            "membershipGiftingEvent" => Self::MembershipGifting,
            "giftMembershipReceivedEvent" => Self::GiftMembershipReceived,
            "superChatEvent" => Self::SuperChat,
            "superStickerEvent" => Self::SuperSticker,
            "textMessageEvent" => Self::TextMessage,
            "tombstone" => Self::Tombstone,
            "userBannedEvent" => Self::UserBanned,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message posted to the live chat of a [`Stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub kind: MessageType,
    /// The stream whose chat the message was posted to.
    pub stream: Stream,
    /// The channel that sent the message.
    pub channel: Channel,
    pub published_at: Timestamp,
    /// The displayable text of the message. Empty for messages without any.
    pub content: String,
}

impl Message {
    /// Creates a message from a `liveChatMessage` resource.
    ///
    /// Returns `None` if the resource lacks the `authorDetails` part.
    pub fn from_youtube(resource: &LiveChatMessage, stream: &Stream) -> Option<Self> {
        let author = resource.author_details.as_ref()?;
        Some(Self {
            id: resource.id.clone(),
            kind: MessageType::from(resource.snippet.details.kind()),
            stream: stream.clone(),
            channel: Channel::from_author(author),
            published_at: resource.snippet.published_at,
            content: resource.snippet.display_message.clone().unwrap_or_default(),
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.channel, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube_api::chat::tests::{author_json, text_message_json};
    use pretty_assertions::assert_eq;

    fn stream() -> Stream {
        Stream {
            id: "437n439gn84ng89h430g49bg".to_string(),
            chat_id: "chat123".to_string(),
            start_time: "2022-01-01T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn from_text_message() {
        let resource: LiveChatMessage = serde_json::from_value(text_message_json(
            "msg1",
            "2022-01-01T00:01:00Z",
            "Hello, world!",
        ))
        .unwrap();

        let message = Message::from_youtube(&resource, &stream()).unwrap();
        assert_eq!(message.id, "msg1");
        assert_eq!(message.kind, MessageType::TextMessage);
        assert_eq!(message.stream, stream());
        assert_eq!(message.channel.id, "UCviewer");
        assert_eq!(message.channel.name, "A Viewer");
        assert_eq!(
            message.published_at,
            "2022-01-01T00:01:00Z".parse::<Timestamp>().unwrap()
        );
        assert_eq!(message.content, "Hello, world!");
        assert_eq!(message.to_string(), "A Viewer: Hello, world!");
    }

    #[test]
    fn without_display_message() {
        let resource: LiveChatMessage = serde_json::from_value(serde_json::json!({
            "id": "msg9",
            "snippet": {
                "type": "chatEndedEvent",
                "liveChatId": "chat123",
                "authorChannelId": "UCowner",
                "publishedAt": "2022-01-01T02:00:00Z"
            },
            "authorDetails": author_json()
        }))
        .unwrap();

        let message = Message::from_youtube(&resource, &stream()).unwrap();
        assert_eq!(message.kind, MessageType::ChatEnded);
        assert_eq!(message.content, "");
    }

    #[test]
    fn without_author() {
        let resource: LiveChatMessage = serde_json::from_value(serde_json::json!({
            "id": "msg10",
            "snippet": {
                "type": "textMessageEvent",
                "liveChatId": "chat123",
                "authorChannelId": "UCbot",
                "publishedAt": "2022-01-01T02:00:00Z",
                "displayMessage": "pong",
                "textMessageDetails": { "messageText": "pong" }
            }
        }))
        .unwrap();
        assert_eq!(Message::from_youtube(&resource, &stream()), None);
    }

    #[test]
    fn message_types() {
        for kind in [
            "chatEndedEvent",
            "messageDeletedEvent",
            "superChatEvent",
            "textMessageEvent",
            "tombstone",
            "userBannedEvent",
        ] {
            let parsed = MessageType::from(kind);
            assert!(!matches!(parsed, MessageType::Other(_)), "{kind}");
            assert_eq!(parsed.as_str(), kind);
        }

        let unknown = MessageType::from("pollEvent");
        assert_eq!(unknown, MessageType::Other("pollEvent".to_string()));
        assert_eq!(unknown.to_string(), "pollEvent");
    }
}
