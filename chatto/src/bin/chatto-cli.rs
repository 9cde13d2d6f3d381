//! Logs a YouTube live chat and answers `!ping` with `pong`.

use chatto::events::{Event, EventKind};
use chatto::{BotConfig, YouTubeBot};
use clap::Parser;
use eyre::Context;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chatto-cli")]
#[command(about = "Log a YouTube live chat, and answer !ping", long_about = None)]
#[command(version)]
struct Cli {
    /// YouTube Data API key.
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    api_key: String,
    /// The channel whose live chat to join.
    #[arg(long, env = "YOUTUBE_CHANNEL_ID")]
    channel_id: String,
    /// Join the chat of this video instead of searching for the channel's live broadcast.
    #[arg(long, env = "YOUTUBE_STREAM_ID")]
    stream_id: Option<String>,
    /// OAuth client secrets. Needed to answer in the chat.
    #[arg(long, env = "YOUTUBE_SECRETS_FILE")]
    secrets_file: Option<PathBuf>,
    /// Only read the chat, never authorise.
    #[arg(
        long,
        env = "CHATTO_READ_ONLY",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    read_only: bool,
    /// Go through the browser authorization flow even if a saved token exists.
    #[arg(long)]
    force_auth: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let cli = Cli::parse();

    let mut config = BotConfig::new(cli.api_key, cli.channel_id)?.read_only(cli.read_only);
    if let Some(stream_id) = cli.stream_id {
        config = config.with_stream_id(stream_id);
    }
    if let Some(secrets_file) = cli.secrets_file {
        config = config.with_secrets_file(secrets_file);
    }
    let read_only = config.is_read_only() || config.secrets_file().is_none();

    let mut bot = YouTubeBot::new(config)?;

    bot.subscribe(EventKind::StreamFetched, |event| async move {
        if let Event::StreamFetched(stream) = event {
            tracing::info!(stream_id = %stream.id, started = %stream.start_time, "found stream");
        }
        Ok(())
    });
    bot.subscribe(EventKind::Ready, |_| async {
        tracing::info!("listening for messages");
        Ok(())
    });

    let chat = bot.handle();
    bot.subscribe(EventKind::MessageCreated, move |event| {
        let chat = chat.clone();
        async move {
            let Event::MessageCreated(message) = event else {
                return Ok(());
            };
            tracing::info!(
                author = %message.channel,
                kind = %message.kind,
                content = %message.content,
                "chat message"
            );
            if !read_only && message.content.trim() == "!ping" {
                chat.reply(&message, "pong")
                    .await
                    .context("reply to !ping")?;
            }
            Ok(())
        }
    });
    bot.subscribe(EventKind::MessageDeleted, |event| async move {
        if let Event::MessageDeleted {
            message,
            deleted_message_id,
        } = event
        {
            tracing::info!(moderator = %message.channel, %deleted_message_id, "message deleted");
        }
        Ok(())
    });
    bot.subscribe(EventKind::ChatEnded, |_| async {
        tracing::info!("the chat has ended");
        Ok(())
    });

    if cli.force_auth {
        bot.authorise(true)
            .await
            .context("force re-authorisation")?;
    }

    bot.run(None).await
}
