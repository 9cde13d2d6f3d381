//! Bot configuration, either built in code or read from the environment.

use crate::error::ChattoError;
use std::path::PathBuf;
use std::time::Duration;

/// Base URL of the YouTube Data API v3.
pub const YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// How long to wait before polling again after a transient error.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Everything a [`YouTubeBot`](crate::YouTubeBot) needs to connect to a live chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub(crate) api_key: String,
    pub(crate) channel_id: String,
    pub(crate) stream_id: Option<String>,
    pub(crate) secrets_file: Option<PathBuf>,
    pub(crate) read_only: bool,
    pub(crate) api_base_url: String,
    pub(crate) retry_delay: Duration,
}

impl BotConfig {
    /// Creates a configuration for the channel with the given ID.
    ///
    /// The API key is used for every read when the bot is not authorised with OAuth.
    pub fn new(api_key: impl Into<String>, channel_id: impl Into<String>) -> eyre::Result<Self> {
        let channel_id = channel_id.into();
        if channel_id.is_empty() {
            return Err(ChattoError::MissingRequiredInformation(
                "a channel ID must be provided".to_string(),
            )
            .into());
        }

        Ok(Self {
            api_key: api_key.into(),
            channel_id,
            stream_id: None,
            secrets_file: None,
            read_only: false,
            api_base_url: YOUTUBE_API_BASE_URL.to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Reads the configuration from the process environment.
    ///
    /// | Variable               | Meaning                                    |
    /// |------------------------|--------------------------------------------|
    /// | `YOUTUBE_API_KEY`      | API key (required)                         |
    /// | `YOUTUBE_CHANNEL_ID`   | channel to connect to (required)           |
    /// | `YOUTUBE_STREAM_ID`    | skip live search and use this video        |
    /// | `YOUTUBE_SECRETS_FILE` | OAuth client secrets, enables sending      |
    /// | `CHATTO_READ_ONLY`     | `true`/`1`/`yes`/`on` to never authorise   |
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Self::from_env`], but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> eyre::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("YOUTUBE_API_KEY").ok_or_else(|| {
            ChattoError::MissingRequiredInformation("YOUTUBE_API_KEY must be set".to_string())
        })?;
        let channel_id = get("YOUTUBE_CHANNEL_ID").ok_or_else(|| {
            ChattoError::MissingRequiredInformation("a channel ID must be provided".to_string())
        })?;

        let mut config = Self::new(api_key, channel_id)?;
        config.stream_id = get("YOUTUBE_STREAM_ID");
        config.secrets_file = get("YOUTUBE_SECRETS_FILE").map(PathBuf::from);
        config.read_only = get("CHATTO_READ_ONLY").is_some_and(|v| parse_flag(&v));
        Ok(config)
    }

    /// Connects to this video rather than searching for the channel's live broadcast.
    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    /// Uses the OAuth client secrets at `path`, which is required for sending and deleting messages.
    pub fn with_secrets_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets_file = Some(path.into());
        self
    }

    /// In read-only mode the bot never authorises and can only receive messages.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The secrets file, unless the bot is read-only.
    pub fn secrets_file(&self) -> Option<&std::path::Path> {
        if self.read_only {
            None
        } else {
            self.secrets_file.as_deref()
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
