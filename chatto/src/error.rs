//! Typed failure conditions that callers may want to react to.
//!
//! Everything fallible in this crate returns [`eyre::Result`], and these errors travel inside the
//! [`eyre::Report`]. Use [`ChattoError::find`] to get at them again.

/// Failure conditions specific to running a chat bot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChattoError {
    /// The YouTube API answered with a non-success status code.
    #[error("{code}: {body}")]
    Http {
        /// The HTTP status code.
        code: u16,
        /// The most specific error message the API provided.
        body: String,
    },

    /// The channel (or the selected stream) has no live chat to connect to.
    #[error("{0}")]
    ChannelNotLive(String),

    /// No video exists with the given ID.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// Not enough information was provided to perform the task.
    #[error("{0}")]
    MissingRequiredInformation(String),

    /// An OAuth operation was attempted without client secrets.
    #[error("{0}")]
    NoSecrets(String),

    /// A write operation was attempted before the bot was authorised.
    #[error("{0}")]
    NotAuthorised(String),

    /// A write operation was attempted on a read-only bot.
    #[error("the bot is running in read-only mode")]
    ReadOnly,

    /// An event was dispatched before the event queue was created.
    #[error("there is no event queue")]
    NoEventQueue,
}

impl ChattoError {
    /// Finds a [`ChattoError`] anywhere in the cause chain of `report`.
    pub fn find(report: &eyre::Report) -> Option<&ChattoError> {
        report
            .chain()
            .find_map(|cause| cause.downcast_ref::<ChattoError>())
    }

    /// Whether retrying the failed request is pointless.
    ///
    /// Client errors (4xx) such as an exhausted quota or a bad API key will not fix themselves.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Http { code, .. } if (400..=499).contains(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn http_error_display() {
        let e = ChattoError::Http {
            code: 403,
            body: "The request cannot be completed because you have exceeded your quota."
                .to_string(),
        };
        insta::assert_snapshot!(e, @"403: The request cannot be completed because you have exceeded your quota.");
    }

    #[test]
    fn fatal_only_for_client_errors() {
        let http = |code| ChattoError::Http {
            code,
            body: String::new(),
        };
        assert!(http(400).is_fatal());
        assert!(http(403).is_fatal());
        assert!(http(499).is_fatal());
        assert!(!http(500).is_fatal());
        assert!(!http(503).is_fatal());
        assert!(!ChattoError::ReadOnly.is_fatal());
    }

    #[test]
    fn find_through_context() {
        let report = Err::<(), _>(ChattoError::ChannelNotLive(
            "the provided channel is not live".to_string(),
        ))
        .wrap_err("fetch active stream")
        .wrap_err("fetch stream info")
        .unwrap_err();

        assert_eq!(
            ChattoError::find(&report),
            Some(&ChattoError::ChannelNotLive(
                "the provided channel is not live".to_string()
            ))
        );
        assert_eq!(ChattoError::find(&eyre::eyre!("unrelated")), None);
    }
}
