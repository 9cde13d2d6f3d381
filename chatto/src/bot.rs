//! The bot itself: ties configuration, the API client, and event dispatch together.

use crate::config::BotConfig;
use crate::error::ChattoError;
use crate::events::{Event, EventHandler, EventKind};
use crate::message::Message;
use crate::oauth::{OAuthManager, TokenStore};
use crate::secrets::Secrets;
use crate::stream::Stream;
use crate::youtube_api::{LiveChatMessage, LiveChatMessageDetails, SnippetDetails, YouTubeClient};
use eyre::Context;
use jiff::Timestamp;
use std::future::Future;
use tokio_stream::StreamExt;
use tracing::instrument;

/// A bot attached to the live chat of a YouTube channel.
///
/// ```rust,no_run
/// use chatto::{BotConfig, YouTubeBot, events::{Event, EventKind}};
///
/// # fn main() -> eyre::Result<()> {
/// let mut bot = YouTubeBot::new(BotConfig::from_env()?)?;
/// bot.subscribe(EventKind::MessageCreated, |event| async move {
///     if let Event::MessageCreated(message) = event {
///         println!("{message}");
///     }
///     Ok(())
/// });
/// bot.run_blocking(None)
/// # }
/// ```
#[derive(Debug)]
pub struct YouTubeBot {
    config: BotConfig,
    client: YouTubeClient,
    events: EventHandler,
    stream: Option<Stream>,
}

impl YouTubeBot {
    pub fn new(config: BotConfig) -> eyre::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("chatto/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        let client = YouTubeClient::new(config.api_key(), &config.api_base_url, http);

        // Events dispatched before the bot runs are delivered once it does.
        let mut events = EventHandler::new();
        events.create_queue();

        tracing::debug!(
            channel_id = config.channel_id(),
            read_only = config.is_read_only(),
            "created bot"
        );
        Ok(Self {
            config,
            client,
            events,
            stream: None,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn events(&mut self) -> &mut EventHandler {
        &mut self.events
    }

    /// Shorthand for `bot.events().subscribe(kind, callback)`.
    pub fn subscribe<F, Fut>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        self.events.subscribe(kind, callback);
    }

    pub fn platform(&self) -> &'static str {
        "youtube"
    }

    /// The stream the bot is attached to, once it has been fetched.
    pub fn stream(&self) -> Option<&Stream> {
        self.stream.as_ref()
    }

    pub async fn is_authorised(&self) -> bool {
        self.client.is_authorised().await
    }

    /// A cheap, cloneable handle for sending and deleting messages, for use in callbacks.
    ///
    /// Handles taken before the bot is authorised can write once it is.
    pub fn handle(&self) -> ChatHandle {
        ChatHandle {
            client: self.client.clone(),
            read_only: self.config.is_read_only(),
        }
    }

    /// Authorises the bot with OAuth so it can send and delete messages.
    ///
    /// A token saved by an earlier run is refreshed and re-used unless `force` is set. Otherwise
    /// the user is sent through the browser authorization flow. The resulting token is saved
    /// next to the secrets file, and [`Event::Authorised`] is dispatched.
    ///
    /// # Arguments
    ///
    /// * `force` - ignore any saved token and always ask the user
    ///
    /// # Errors
    ///
    /// Fails with [`ChattoError::NoSecrets`] if no secrets file is configured (or the bot is
    /// read-only), and with the underlying error if the secrets cannot be read or the user does
    /// not complete the flow.
    #[instrument(skip(self))]
    pub async fn authorise(&mut self, force: bool) -> eyre::Result<()> {
        let Some(path) = self.config.secrets_file() else {
            return Err(ChattoError::NoSecrets(
                "you must provide a secrets file to authorise the bot".to_string(),
            )
            .into());
        };

        let secrets = Secrets::from_file(path)?;
        let oauth_manager = OAuthManager::new(secrets.clone());
        let token = oauth_manager
            .obtain_token(&TokenStore::for_secrets(&secrets), force)
            .await?;
        let raw_token = token.raw_token().clone();
        self.client.set_token(token, oauth_manager).await;

        tracing::info!(project = %secrets, "bot authorised");
        self.events.dispatch(Event::Authorised {
            secrets,
            token: raw_token,
        })
    }

    /// Works out which stream to attach to and fetches its details.
    ///
    /// # Arguments
    ///
    /// * `stream_id` - video ID to use instead of the configured one. Without either, the
    ///   channel's current live broadcast is searched for.
    ///
    /// # Returns
    ///
    /// The stream, which is also kept for [`Self::stream`] and dispatched as
    /// [`Event::StreamFetched`]. Fails with [`ChattoError::ChannelNotLive`] if the channel or
    /// video has no active chat.
    #[instrument(skip(self))]
    pub async fn fetch_stream_info(&mut self, stream_id: Option<&str>) -> eyre::Result<&Stream> {
        let stream = match stream_id.or(self.config.stream_id()) {
            Some(stream_id) => Stream::fetch(&self.client, stream_id).await?,
            None => Stream::fetch_active(&self.client, self.config.channel_id()).await?,
        };

        self.events.dispatch(Event::StreamFetched(stream.clone()))?;
        Ok(self.stream.insert(stream))
    }

    /// Runs the bot until the chat ends, a fatal error occurs, or ctrl-c is pressed.
    ///
    /// Only messages published after the bot starts are delivered. Events still queued when
    /// the bot stops are processed before this returns.
    ///
    /// # Arguments
    ///
    /// * `stream_id` - passed on to [`Self::fetch_stream_info`]
    ///
    /// # Returns
    ///
    /// * `Ok(())` - the chat ended or ctrl-c was pressed
    /// * `Err(_)` - the stream could not be found, or polling hit a fatal error
    pub async fn run(&mut self, stream_id: Option<&str>) -> eyre::Result<()> {
        tracing::info!(
            platform = self.platform(),
            channel_id = self.config.channel_id(),
            "starting bot"
        );
        let started_at = Timestamp::now();

        if !self.events.has_queue() {
            self.events.create_queue();
        }
        let processor = tokio::spawn(self.events.process()?);

        let result = tokio::select! {
            r = self.run_until_done(stream_id, started_at) => r,
            r = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, shutting down");
                r.context("listen for ctrl-c")
            }
        };

        if let Err(e) = &result {
            tracing::error!(error = ?e, "a critical error occurred, and the bot cannot continue");
        }

        self.events.close_queue();
        tracing::debug!(
            queued = self.events.queue_size(),
            "waiting for queued events"
        );
        if let Err(e) = processor.await {
            tracing::error!(error = %e, "event processor failed");
        }
        tracing::info!("bot stopped");
        result
    }

    /// Like [`Self::run`], but on a fresh multi-threaded runtime that the call blocks on.
    ///
    /// Since this blocks until the bot stops, it should be the last thing called.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context, since Tokio runtimes
    /// cannot be nested. Use [`Self::run`] there instead.
    pub fn run_blocking(&mut self, stream_id: Option<&str>) -> eyre::Result<()> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("build tokio runtime")?
            .block_on(self.run(stream_id))
    }

    async fn run_until_done(
        &mut self,
        stream_id: Option<&str>,
        started_at: Timestamp,
    ) -> eyre::Result<()> {
        if self.config.secrets_file().is_some() && !self.client.is_authorised().await {
            self.authorise(false).await.context("authorise bot")?;
        }

        let stream = self
            .fetch_stream_info(stream_id)
            .await
            .context("fetch stream info")?
            .clone();
        self.events.dispatch(Event::Ready)?;

        self.poll_for_messages(&stream, started_at).await
    }

    #[instrument(skip_all, fields(chat_id = %stream.chat_id))]
    async fn poll_for_messages(&self, stream: &Stream, since: Timestamp) -> eyre::Result<()> {
        let polls = self
            .client
            .poll_live_chat(&stream.chat_id, since, self.config.retry_delay);
        let mut polls = std::pin::pin!(polls);

        while let Some(poll) = polls.next().await {
            let poll = match poll {
                Ok(poll) => poll,
                Err(e) if ChattoError::find(&e).is_some_and(ChattoError::is_fatal) => {
                    return Err(e).context("poll live chat");
                }
                Err(e) => {
                    tracing::warn!(
                        error = ?e,
                        retry_in = ?self.config.retry_delay,
                        "ignoring error during polling"
                    );
                    continue;
                }
            };

            self.events.dispatch(Event::ChatPolled {
                message_count: poll.messages.len(),
                next_poll_in: poll.next_poll_in,
            })?;
            if !poll.messages.is_empty() {
                tracing::info!(count = poll.messages.len(), "processing new messages");
            }
            for resource in &poll.messages {
                self.dispatch_message(resource, stream)?;
            }

            if poll.ended {
                tracing::info!("chat has ended");
                break;
            }
        }
        Ok(())
    }

    fn dispatch_message(&self, resource: &LiveChatMessage, stream: &Stream) -> eyre::Result<()> {
        if resource.is_chat_end() {
            return self.events.dispatch(Event::ChatEnded(stream.clone()));
        }

        let Some(message) = Message::from_youtube(resource, stream) else {
            tracing::warn!(message_id = %resource.id, "skipping message without author details");
            return Ok(());
        };

        let event = match &resource.snippet.details {
            SnippetDetails::Known(LiveChatMessageDetails::MessageDeleted {
                message_deleted_details,
            }) => Event::MessageDeleted {
                deleted_message_id: message_deleted_details.deleted_message_id.clone(),
                message,
            },
            _ => Event::MessageCreated(message),
        };
        self.events.dispatch(event)
    }
}

/// Sends and deletes chat messages on behalf of a [`YouTubeBot`].
#[derive(Debug, Clone)]
pub struct ChatHandle {
    client: YouTubeClient,
    read_only: bool,
}

impl ChatHandle {
    /// Posts `text` to the live chat with the given ID.
    ///
    /// # Arguments
    ///
    /// * `chat_id` - the live chat ID, usually [`Stream::chat_id`]
    /// * `text` - the message to post
    ///
    /// # Returns
    ///
    /// The message as YouTube stored it. Fails with [`ChattoError::ReadOnly`] for read-only bots and with
    /// [`ChattoError::NotAuthorised`] if the bot has not been authorised.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> eyre::Result<LiveChatMessage> {
        self.ensure_writable()?;
        self.client
            .insert_live_chat_message(chat_id, text)
            .await
            .context("send chat message")
    }

    /// Posts `text` to the chat `message` was posted in.
    pub async fn reply(&self, message: &Message, text: &str) -> eyre::Result<LiveChatMessage> {
        self.send_message(&message.stream.chat_id, text).await
    }

    /// Deletes the message with the given ID.
    pub async fn delete_message(&self, message_id: &str) -> eyre::Result<()> {
        self.ensure_writable()?;
        self.client
            .delete_live_chat_message(message_id)
            .await
            .context("delete chat message")
    }

    fn ensure_writable(&self) -> eyre::Result<()> {
        if self.read_only {
            return Err(ChattoError::ReadOnly.into());
        }
        Ok(())
    }
}
