//! Chatto: build bots for YouTube live chats.
//!
//! A [`YouTubeBot`] finds a channel's live broadcast, polls its chat, and turns what it sees into
//! [`events::Event`]s that are handed to the callbacks you subscribe. With OAuth client secrets
//! configured, the bot can also send and delete messages through a [`ChatHandle`].
//!
//! ```rust,no_run
//! use chatto::events::{Event, EventKind};
//! use chatto::{BotConfig, YouTubeBot};
//!
//! # async fn example() -> eyre::Result<()> {
//! let config = BotConfig::new("my-api-key", "UC4R8DWoMoI7CAwX8_LjQHig")?
//!     .with_secrets_file("secrets/client_secrets.json");
//! let mut bot = YouTubeBot::new(config)?;
//!
//! let chat = bot.handle();
//! bot.subscribe(EventKind::MessageCreated, move |event| {
//!     let chat = chat.clone();
//!     async move {
//!         if let Event::MessageCreated(message) = event {
//!             if message.content == "!hello" {
//!                 chat.reply(&message, "Hi there!").await?;
//!             }
//!         }
//!         Ok(())
//!     }
//! });
//!
//! bot.run(None).await
//! # }
//! ```
//!
//! Everything fallible returns [`eyre::Result`]. Failures a caller may want to act on are
//! [`ChattoError`]s inside the report, see [`ChattoError::find`].

pub mod bot;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod message;
pub mod oauth;
pub mod secrets;
pub mod stream;
pub mod youtube_api;

pub use bot::{ChatHandle, YouTubeBot};
pub use channel::Channel;
pub use config::BotConfig;
pub use error::ChattoError;
pub use events::{Event, EventHandler, EventKind};
pub use message::{Message, MessageType};
pub use secrets::Secrets;
pub use stream::Stream;
