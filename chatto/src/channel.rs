//! The YouTube channel behind a chat message.

use crate::youtube_api::LiveChatMessageAuthor;
use std::fmt;

/// A channel taking part in a live chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    pub id: String,
    pub url: String,
    /// The display name of the channel.
    pub name: String,
    pub avatar_url: String,
    /// Whether YouTube has verified the channel's identity.
    pub is_verified: bool,
    /// Whether the channel owns the live chat.
    pub is_owner: bool,
    /// Whether the channel is a member (sponsor) of the chat owner's channel.
    pub is_sponsor: bool,
    pub is_moderator: bool,
}

impl Channel {
    /// Creates a channel from the `authorDetails` of a `liveChatMessage` resource.
    pub fn from_author(author: &LiveChatMessageAuthor) -> Self {
        Self {
            id: author.channel_id.clone(),
            url: author.channel_url.clone(),
            name: author.display_name.clone(),
            avatar_url: author.profile_image_url.clone(),
            is_verified: author.is_verified,
            is_owner: author.is_chat_owner,
            is_sponsor: author.is_chat_sponsor,
            is_moderator: author.is_chat_moderator,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_author_details() {
        let author: LiveChatMessageAuthor = serde_json::from_value(serde_json::json!({
            "channelId": "Ucn978gn48bg984b",
            "channelUrl": "https://youtube.com/mychannel",
            "displayName": "Test Channel",
            "profileImageUrl": "https://youtube.com/myavatar",
            "isVerified": true,
            "isChatOwner": false,
            "isChatSponsor": true,
            "isChatModerator": false
        }))
        .unwrap();

        assert_eq!(
            Channel::from_author(&author),
            Channel {
                id: "Ucn978gn48bg984b".to_string(),
                url: "https://youtube.com/mychannel".to_string(),
                name: "Test Channel".to_string(),
                avatar_url: "https://youtube.com/myavatar".to_string(),
                is_verified: true,
                is_owner: false,
                is_sponsor: true,
                is_moderator: false,
            }
        );
        assert_eq!(Channel::from_author(&author).to_string(), "Test Channel");
    }
}
