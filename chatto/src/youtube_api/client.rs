//! The HTTP client for the YouTube Data API, and the OAuth token it authenticates with.

use crate::error::ChattoError;
use crate::oauth::OAuthManager;
use crate::youtube_api::chat::{
    ChatPoll, LiveChatMessage, LiveChatMessageInsert, LiveChatMessageListResponse, LiveChatPoller,
};
use crate::youtube_api::search::SearchListResponse;
use crate::youtube_api::types::ErrorResponse;
use crate::youtube_api::videos::{Video, VideoListResponse};
use eyre::Context;
use http::Method;
use jiff::Timestamp;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio_stream::Stream;
use tracing::instrument;

/// An OAuth token together with the moment it stops being usable.
#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: BasicTokenResponse,
    /// Five minutes before the access token actually expires.
    expires_at: SystemTime,
}

impl TimeBoundAccessToken {
    /// Wraps a token that is already expired, forcing a refresh before first use.
    ///
    /// Used for tokens loaded from disk, whose real age is unknown.
    pub fn expired(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: SystemTime::UNIX_EPOCH,
            token,
        }
    }

    /// Wraps a freshly issued token.
    ///
    /// The expiry is the token's `expires_in` minus a 5-minute safety buffer.
    pub fn new(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: expiry_of(&token),
            token,
        }
    }

    pub fn raw_token(&self) -> &BasicTokenResponse {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Refreshes this token in place, keeping the refresh token if the new one lacks it.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the token was refreshed and is good for another hour
    /// * `Ok(false)` - there is no refresh token, or Google rejected it; the user must
    ///   re-authorise
    /// * `Err(_)` - the token endpoint could not be reached or answered with an error
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        let Some(mut refreshed) = oauth_manager
            .refresh_token(self.token.clone())
            .await
            .context("refresh OAuth token")?
        else {
            return Ok(false);
        };

        // Google usually omits the refresh token from refresh responses.
        if refreshed.refresh_token().is_none() {
            refreshed.set_refresh_token(self.token.refresh_token().cloned());
        }
        self.expires_at = expiry_of(&refreshed);
        self.token = refreshed;
        tracing::trace!(expires_at = ?self.expires_at, "token refreshed");
        Ok(true)
    }
}

fn expiry_of(token: &BasicTokenResponse) -> SystemTime {
    const SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);
    // Google access tokens live for an hour.
    let lifetime = token.expires_in().unwrap_or(Duration::from_secs(60 * 60));
    SystemTime::now() + lifetime.saturating_sub(SAFETY_MARGIN)
}

/// What a request needs to be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    /// Reading public data. An API key is enough.
    Read,
    /// Changing data on behalf of a user. Requires OAuth.
    Write,
}

#[derive(Debug)]
struct Session {
    token: TimeBoundAccessToken,
    oauth_manager: OAuthManager,
}

/// Client for the parts of the YouTube Data API v3 that a chat bot needs.
///
/// Reads are authenticated with the API key until the client is given an OAuth token with
/// [`Self::set_token`], after which every request uses the token. Writes always need the token.
///
/// Clones share the token, so authorising one clone authorises them all. Expired tokens are
/// refreshed before a request is sent.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    api_key: String,
    base_url: String,
    session: Arc<Mutex<Option<Session>>>,
    client: reqwest::Client,
}

impl YouTubeClient {
    /// Creates a client that talks to the API at `base_url`.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            session: Arc::new(Mutex::new(None)),
            client,
        }
    }

    /// Authorises this client (and all its clones) with an OAuth token.
    ///
    /// # Arguments
    ///
    /// * `token` - the token to send with every request from now on
    /// * `oauth_manager` - used to refresh `token` once it expires
    pub async fn set_token(&self, token: TimeBoundAccessToken, oauth_manager: OAuthManager) {
        *self.session.lock().await = Some(Session {
            token,
            oauth_manager,
        });
    }

    pub async fn is_authorised(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Returns a clone of the current OAuth token, if there is one.
    pub async fn token(&self) -> Option<BasicTokenResponse> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.token.raw_token().clone())
    }

    /// The access token to send, refreshed first if it has expired.
    ///
    /// `Ok(None)` means the client is not authorised and should fall back to the API key. A
    /// token whose refresh Google rejects (for example because the user revoked access) is
    /// dropped, so the client carries on as if it had never been authorised.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    async fn fresh_access_token(&self) -> eyre::Result<Option<String>> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Ok(None);
        };

        if session.token.is_expired() {
            tracing::debug!("access token expired");
            if !session.token.refresh(&session.oauth_manager).await? {
                tracing::error!("expired access token could not be refreshed, dropping it");
                *guard = None;
                return Ok(None);
            }
        }

        Ok(Some(
            session.token.raw_token().access_token().secret().to_string(),
        ))
    }

    /// Sends a request to `path` under the API base URL.
    ///
    /// Takes care of authentication for the given [`Access`] level and turns any non-success
    /// response into a [`ChattoError::Http`].
    #[instrument(skip(self, json_body), level = tracing::Level::TRACE)]
    pub(crate) async fn make_request(
        &self,
        method: Method,
        path: &str,
        access: Access,
        query_params: &[(&str, &str)],
        json_body: Option<&(impl Serialize + Sync)>,
    ) -> eyre::Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url).query(query_params);

        match (self.fresh_access_token().await?, access) {
            (Some(access_token), _) => {
                request = request.bearer_auth(access_token);
            }
            (None, Access::Read) => {
                request = request.query(&[("key", self.api_key.as_str())]);
            }
            (None, Access::Write) => {
                return Err(ChattoError::NotAuthorised(
                    "you must authorise the bot before sending or deleting messages".to_string(),
                )
                .into());
            }
        }

        if let Some(body) = json_body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("send {} request to YouTube API: {}", method, path))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) => ErrorResponse::message_from(&text),
                Err(e) => format!("unreadable error response: {e}"),
            };
            tracing::debug!(%method, path, %status, body = %body, "YouTube API request failed");
            return Err(ChattoError::Http {
                code: status.as_u16(),
                body,
            })
            .with_context(|| format!("YouTube API {} {} failed", method, path));
        }

        Ok(response)
    }

    /// Finds the ID of the live broadcast currently running on a channel.
    ///
    /// Fails with [`ChattoError::ChannelNotLive`] if the channel is not live.
    ///
    /// # API Cost
    ///
    /// Searching costs 100 quota units, so prefer passing a stream ID where possible.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/search/list>
    #[instrument(skip(self), ret)]
    pub async fn search_live_video(&self, channel_id: &str) -> eyre::Result<String> {
        let query_params = [
            ("part", "id"),
            ("channelId", channel_id),
            ("eventType", "live"),
            ("type", "video"),
        ];

        let response = self
            .make_request(Method::GET, "search", Access::Read, &query_params, None::<&()>)
            .await?;

        let results: SearchListResponse = response
            .json()
            .await
            .context("parse YouTube search API response as JSON")?;

        tracing::debug!(
            channel_id,
            returned_items = results.items.len(),
            "searched for live video"
        );

        results
            .items
            .into_iter()
            .find_map(|result| result.id.video_id)
            .ok_or_else(|| {
                ChattoError::ChannelNotLive("the provided channel is not live".to_string()).into()
            })
    }

    /// Gets the live streaming details for a single video.
    ///
    /// Fails with [`ChattoError::StreamNotFound`] if no video has that ID.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self), ret)]
    pub async fn get_video(&self, video_id: &str) -> eyre::Result<Video> {
        let query_params = [("part", "liveStreamingDetails"), ("id", video_id)];

        let response = self
            .make_request(Method::GET, "videos", Access::Read, &query_params, None::<&()>)
            .await?;

        let videos: VideoListResponse = response
            .json()
            .await
            .context("parse YouTube videos API response as JSON")?;

        videos
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ChattoError::StreamNotFound(video_id.to_string()).into())
    }

    /// Lists one page of messages from a live chat.
    ///
    /// # Arguments
    ///
    /// * `live_chat_id` - the chat's ID, see [`LiveStreamingDetails::active_live_chat_id`]
    /// * `page_token` - the `nextPageToken` of the previous page, or `None` for the most recent
    ///   messages
    ///
    /// [`LiveStreamingDetails::active_live_chat_id`]: crate::youtube_api::LiveStreamingDetails::active_live_chat_id
    ///
    /// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/list>
    #[instrument(skip(self))]
    pub async fn list_live_chat_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
    ) -> eyre::Result<LiveChatMessageListResponse> {
        let mut query_params = vec![
            ("liveChatId", live_chat_id),
            ("part", "id,snippet,authorDetails"),
        ];
        if let Some(token) = page_token {
            query_params.push(("pageToken", token));
        }

        let response = self
            .make_request(
                Method::GET,
                "liveChat/messages",
                Access::Read,
                &query_params,
                None::<&()>,
            )
            .await?;

        let messages: LiveChatMessageListResponse = response
            .json()
            .await
            .context("parse YouTube liveChatMessages API response as JSON")?;

        tracing::trace!(
            returned_items = messages.items.len(),
            polling_interval_millis = messages.polling_interval_millis,
            "fetched live chat messages"
        );

        Ok(messages)
    }

    /// Posts a text message to a live chat.
    ///
    /// Needs an OAuth token with the `youtube` scope.
    ///
    /// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/insert>
    #[instrument(skip(self, text), ret)]
    pub async fn insert_live_chat_message(
        &self,
        live_chat_id: &str,
        text: &str,
    ) -> eyre::Result<LiveChatMessage> {
        let body = LiveChatMessageInsert::text(live_chat_id, text);
        let response = self
            .make_request(
                Method::POST,
                "liveChat/messages",
                Access::Write,
                &[("part", "snippet")],
                Some(&body),
            )
            .await?;

        let message: LiveChatMessage = response
            .json()
            .await
            .context("parse YouTube liveChatMessages insert response as JSON")?;

        tracing::debug!(message_id = %message.id, "sent chat message");
        Ok(message)
    }

    /// Deletes a message from a live chat.
    ///
    /// Needs an OAuth token with the `youtube` scope.
    ///
    /// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/delete>
    #[instrument(skip(self))]
    pub async fn delete_live_chat_message(&self, message_id: &str) -> eyre::Result<()> {
        let _response = self
            .make_request(
                Method::DELETE,
                "liveChat/messages",
                Access::Write,
                &[("id", message_id)],
                None::<&()>,
            )
            .await?;

        tracing::debug!(message_id, "deleted chat message");
        Ok(())
    }

    /// Returns a stream of new messages from a live chat, polled at the rate the API asks for.
    ///
    /// # Arguments
    ///
    /// * `live_chat_id` - the chat to poll
    /// * `since` - messages published at or before this moment are never yielded
    /// * `retry_delay` - how long to wait before polling again after a transient error
    ///
    /// See [`LiveChatPoller`] for how new messages, errors, and the end of the chat are handled.
    #[instrument(skip(self))]
    pub fn poll_live_chat(
        &self,
        live_chat_id: &str,
        since: Timestamp,
        retry_delay: Duration,
    ) -> impl Stream<Item = eyre::Result<ChatPoll>> + Send + use<> {
        LiveChatPoller::new(self.clone(), live_chat_id, since, retry_delay).into_stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::tests::{manager, stored_token};
    use pretty_assertions::assert_eq;

    fn client(server: &mockito::Server) -> YouTubeClient {
        YouTubeClient::new("api-key", server.url(), reqwest::Client::new())
    }

    #[tokio::test]
    async fn reads_use_api_key_without_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/videos")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("key".into(), "api-key".into()),
                mockito::Matcher::UrlEncoded("id".into(), "video123".into()),
                mockito::Matcher::UrlEncoded("part".into(), "liveStreamingDetails".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "kind": "youtube#videoListResponse",
                    "items": [{
                        "id": "video123",
                        "liveStreamingDetails": {
                            "actualStartTime": "2024-05-01T11:58:00Z",
                            "activeLiveChatId": "chat123"
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let video = client(&server).get_video("video123").await.unwrap();
        assert_eq!(video.id, "video123");
        assert_eq!(
            video
                .live_streaming_details
                .unwrap()
                .active_live_chat_id
                .as_deref(),
            Some("chat123")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn requests_use_bearer_token_when_authorised() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/liveChat/messages")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "msg1".into()))
            .match_header("authorization", "Bearer fresh-token")
            .with_status(204)
            .create_async()
            .await;

        let client = client(&server);
        assert!(!client.is_authorised().await);
        client
            .set_token(
                TimeBoundAccessToken::new(stored_token("fresh-token", Some("refresh-me"))),
                manager(&server),
            )
            .await;
        assert!(client.is_authorised().await);

        client.delete_live_chat_message("msg1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_before_request() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"refreshed","token_type":"Bearer","expires_in":3599}"#)
            .expect(1)
            .create_async()
            .await;
        let _search = server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::Any)
            .match_header("authorization", "Bearer refreshed")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items": [{"id": {"kind": "youtube#video", "videoId": "live1"}}]}"#)
            .create_async()
            .await;

        let client = client(&server);
        client
            .set_token(
                TimeBoundAccessToken::expired(stored_token("stale", Some("refresh-me"))),
                manager(&server),
            )
            .await;

        assert_eq!(client.search_live_video("UCchannel").await.unwrap(), "live1");
        assert_eq!(client.search_live_video("UCchannel").await.unwrap(), "live1");
        refresh.assert_async().await;

        let token = client.token().await.unwrap();
        assert_eq!(token.access_token().secret(), "refreshed");
        assert_eq!(
            token.refresh_token().map(|t| t.secret().as_str()),
            Some("refresh-me")
        );
    }

    #[tokio::test]
    async fn revoked_token_falls_back_to_api_key() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let messages = server
            .mock("GET", "/liveChat/messages")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("key".into(), "api-key".into()),
                mockito::Matcher::UrlEncoded("liveChatId".into(), "chat123".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"pollingIntervalMillis": 10, "items": []}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client(&server);
        client
            .set_token(
                TimeBoundAccessToken::expired(stored_token("stale", Some("revoked"))),
                manager(&server),
            )
            .await;

        // Reads carry on with the API key, and the dead token is not tried again.
        client.list_live_chat_messages("chat123", None).await.unwrap();
        client.list_live_chat_messages("chat123", None).await.unwrap();
        assert!(!client.is_authorised().await);
        refresh.assert_async().await;
        messages.assert_async().await;

        let err = client
            .insert_live_chat_message("chat123", "hello")
            .await
            .unwrap_err();
        assert!(matches!(
            ChattoError::find(&err),
            Some(ChattoError::NotAuthorised(_))
        ));
    }

    #[tokio::test]
    async fn writes_require_token() {
        let server = mockito::Server::new_async().await;
        let err = client(&server)
            .insert_live_chat_message("chat123", "hello")
            .await
            .unwrap_err();
        insta::assert_snapshot!(err, @"you must authorise the bot before sending or deleting messages");
        assert!(matches!(
            ChattoError::find(&err),
            Some(ChattoError::NotAuthorised(_))
        ));
    }

    #[tokio::test]
    async fn search_without_results() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("channelId".into(), "UCchannel".into()),
                mockito::Matcher::UrlEncoded("eventType".into(), "live".into()),
                mockito::Matcher::UrlEncoded("type".into(), "video".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"kind": "youtube#searchListResponse", "items": []}"#)
            .create_async()
            .await;

        let err = client(&server)
            .search_live_video("UCchannel")
            .await
            .unwrap_err();
        insta::assert_snapshot!(err, @"the provided channel is not live");
    }

    #[tokio::test]
    async fn video_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/videos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items": []}"#)
            .create_async()
            .await;

        let err = client(&server).get_video("nope").await.unwrap_err();
        assert_eq!(
            ChattoError::find(&err),
            Some(&ChattoError::StreamNotFound("nope".to_string()))
        );
    }

    #[tokio::test]
    async fn http_errors_carry_google_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/liveChat/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error": {"code": 403, "message": "Forbidden", "errors": [{"message": "The live chat is no longer live."}]}}"#,
            )
            .create_async()
            .await;

        let err = client(&server)
            .list_live_chat_messages("chat123", None)
            .await
            .unwrap_err();
        let http = ChattoError::find(&err).unwrap();
        assert_eq!(
            http,
            &ChattoError::Http {
                code: 403,
                body: "The live chat is no longer live.".to_string()
            }
        );
        assert!(http.is_fatal());
    }
}
