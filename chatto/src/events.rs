//! Events a bot emits, and the machinery for delivering them to callbacks.
//!
//! Events are pushed onto a queue with [`EventHandler::dispatch`] and handed, one at a time and in
//! order, to every callback subscribed to that [`EventKind`]. A slow callback therefore delays all
//! later events, but never the polling of the chat itself.

use crate::error::ChattoError;
use crate::message::Message;
use crate::secrets::Secrets;
use crate::stream::Stream;
use oauth2::basic::BasicTokenResponse;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Something that happened to a bot or in its chat.
#[derive(Debug, Clone)]
pub enum Event {
    /// The bot has found its stream and is about to start polling.
    Ready,
    /// The bot was authorised with OAuth and can now send and delete messages.
    Authorised {
        secrets: Secrets,
        token: BasicTokenResponse,
    },
    /// Information about the stream to connect to has been fetched.
    StreamFetched(Stream),
    /// The chat was polled.
    ChatPolled {
        /// How many new messages the poll returned.
        message_count: usize,
        /// How long until the chat is polled again.
        next_poll_in: Duration,
    },
    /// Someone posted to the chat.
    ///
    /// This covers every message type except deletions, including Super Chats and membership
    /// events. Check [`Message::kind`] to tell them apart.
    MessageCreated(Message),
    /// A moderator deleted a message.
    MessageDeleted {
        /// The deletion notice itself. Its channel is the moderator.
        message: Message,
        deleted_message_id: String,
    },
    /// The chat has ended. The bot stops once this has been handled.
    ChatEnded(Stream),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready => EventKind::Ready,
            Self::Authorised { .. } => EventKind::Authorised,
            Self::StreamFetched(_) => EventKind::StreamFetched,
            Self::ChatPolled { .. } => EventKind::ChatPolled,
            Self::MessageCreated(_) => EventKind::MessageCreated,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
            Self::ChatEnded(_) => EventKind::ChatEnded,
        }
    }
}

/// The type of an [`Event`], used to subscribe to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Authorised,
    StreamFetched,
    ChatPolled,
    MessageCreated,
    MessageDeleted,
    ChatEnded,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub type BoxFuture = Pin<Box<dyn Future<Output = eyre::Result<()>> + Send>>;

/// An async function that is run for each event of the kind it is subscribed to.
pub type Callback = Arc<dyn Fn(Event) -> BoxFuture + Send + Sync>;

/// Holds subscriptions and the queue events are delivered through.
#[derive(Default)]
pub struct EventHandler {
    callbacks: HashMap<EventKind, Vec<Callback>>,
    sender: Option<mpsc::UnboundedSender<Event>>,
    receiver: Option<mpsc::UnboundedReceiver<Event>>,
    queued: Arc<AtomicUsize>,
}

// Manual Debug implementation since callbacks don't implement Debug
impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let callbacks: HashMap<_, _> = self
            .callbacks
            .iter()
            .map(|(kind, cbs)| (kind, cbs.len()))
            .collect();
        f.debug_struct("EventHandler")
            .field("callbacks", &callbacks)
            .field("has_queue", &self.sender.is_some())
            .field("queue_size", &self.queue_size())
            .finish()
    }
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `callback` for every future event of the given kind.
    ///
    /// Callbacks for the same kind run in the order they were subscribed in. Only callbacks
    /// subscribed before [`Self::process`] is called are run by that processor.
    pub fn subscribe<F, Fut>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |event| -> BoxFuture { Box::pin(callback(event)) });
        let callbacks = self.callbacks.entry(kind).or_default();
        callbacks.push(callback);
        tracing::info!(%kind, count = callbacks.len(), "subscribed to events");
    }

    /// The number of callbacks subscribed to the given kind of event.
    pub fn callback_count(&self, kind: EventKind) -> usize {
        self.callbacks.get(&kind).map_or(0, Vec::len)
    }

    /// The number of events dispatched but not yet picked up for processing.
    pub fn queue_size(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub fn has_queue(&self) -> bool {
        self.sender.is_some()
    }

    /// Creates the queue events are dispatched onto.
    ///
    /// Creating a second queue discards the first, along with any events still on it.
    pub fn create_queue(&mut self) {
        if self.sender.is_some() {
            tracing::warn!("the event handler already has an event queue");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.sender = Some(tx);
        self.receiver = Some(rx);
        self.queued = Arc::new(AtomicUsize::new(0));
    }

    /// Puts an event on the queue.
    ///
    /// Fails with [`ChattoError::NoEventQueue`] if there is no queue, or it has been closed.
    pub fn dispatch(&self, event: Event) -> eyre::Result<()> {
        let Some(sender) = &self.sender else {
            return Err(ChattoError::NoEventQueue.into());
        };

        let kind = event.kind();
        self.queued.fetch_add(1, Ordering::AcqRel);
        if sender.send(event).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(ChattoError::NoEventQueue.into());
        }
        tracing::debug!(%kind, "dispatched event");
        Ok(())
    }

    /// Closes the queue.
    ///
    /// Events already on the queue are still processed, after which the processor returned by
    /// [`Self::process`] finishes.
    pub fn close_queue(&mut self) {
        if self.sender.take().is_some() {
            tracing::debug!("closed event queue");
        }
    }

    /// Takes the receiving end of the queue and returns a future that runs callbacks for every
    /// event on it.
    ///
    /// The future completes once the queue is closed and drained. Errors returned by callbacks
    /// are logged and otherwise ignored.
    pub fn process(&mut self) -> eyre::Result<impl Future<Output = ()> + Send + 'static> {
        let Some(mut receiver) = self.receiver.take() else {
            return Err(ChattoError::NoEventQueue.into());
        };
        let callbacks = self.callbacks.clone();
        let queued = Arc::clone(&self.queued);

        Ok(async move {
            while let Some(event) = receiver.recv().await {
                queued.fetch_sub(1, Ordering::AcqRel);
                let kind = event.kind();
                tracing::debug!(%kind, "retrieved event");

                for (i, callback) in callbacks.get(&kind).into_iter().flatten().enumerate() {
                    tracing::trace!(%kind, callback = i, "running callback");
                    if let Err(e) = callback(event.clone()).await {
                        tracing::error!(%kind, callback = i, error = ?e, "ignoring error processing event");
                    }
                }
            }
            tracing::debug!("event queue drained");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn record(
        seen: &Seen,
        name: &'static str,
    ) -> impl Fn(Event) -> std::future::Ready<eyre::Result<()>> + Send + Sync + 'static {
        let seen = Arc::clone(seen);
        move |event| {
            seen.lock().unwrap().push(format!("{name}:{}", event.kind()));
            std::future::ready(Ok(()))
        }
    }

    #[test]
    fn dispatch_without_queue() {
        let handler = EventHandler::new();
        let err = handler.dispatch(Event::Ready).unwrap_err();
        insta::assert_snapshot!(err, @"there is no event queue");
        assert_eq!(handler.queue_size(), 0);
    }

    #[test]
    fn process_without_queue() {
        let mut handler = EventHandler::new();
        assert!(handler.process().is_err());
    }

    #[test]
    fn subscribe_counts() {
        let mut handler = EventHandler::new();
        assert_eq!(handler.callback_count(EventKind::Ready), 0);
        handler.subscribe(EventKind::Ready, |_| async { Ok(()) });
        handler.subscribe(EventKind::Ready, |_| async { Ok(()) });
        handler.subscribe(EventKind::ChatEnded, |_| async { Ok(()) });
        assert_eq!(handler.callback_count(EventKind::Ready), 2);
        assert_eq!(handler.callback_count(EventKind::ChatEnded), 1);
        assert_eq!(handler.callback_count(EventKind::MessageCreated), 0);
    }

    #[test]
    fn queue_size_tracks_dispatches() {
        let mut handler = EventHandler::new();
        handler.create_queue();
        assert!(handler.has_queue());
        handler.dispatch(Event::Ready).unwrap();
        handler.dispatch(Event::Ready).unwrap();
        assert_eq!(handler.queue_size(), 2);

        // A new queue starts out empty.
        handler.create_queue();
        assert_eq!(handler.queue_size(), 0);
    }

    #[tokio::test]
    async fn callbacks_run_in_order() {
        let seen = Seen::default();
        let mut handler = EventHandler::new();
        handler.subscribe(EventKind::Ready, record(&seen, "first"));
        handler.subscribe(EventKind::Ready, record(&seen, "second"));
        handler.subscribe(EventKind::ChatPolled, record(&seen, "polled"));

        handler.create_queue();
        let processor = tokio::spawn(handler.process().unwrap());
        handler.dispatch(Event::Ready).unwrap();
        handler
            .dispatch(Event::ChatPolled {
                message_count: 0,
                next_poll_in: Duration::from_secs(1),
            })
            .unwrap();
        handler.dispatch(Event::Ready).unwrap();
        handler.close_queue();
        processor.await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "first:Ready",
                "second:Ready",
                "polled:ChatPolled",
                "first:Ready",
                "second:Ready",
            ]
        );
        assert_eq!(handler.queue_size(), 0);
        assert!(handler.dispatch(Event::Ready).is_err());
    }

    #[tokio::test]
    async fn failing_callback_does_not_stop_processing() {
        let seen = Seen::default();
        let mut handler = EventHandler::new();
        handler.subscribe(EventKind::Ready, |_| async {
            Err(eyre::eyre!("callback failed"))
        });
        handler.subscribe(EventKind::Ready, record(&seen, "after"));

        handler.create_queue();
        let processor = handler.process().unwrap();
        handler.dispatch(Event::Ready).unwrap();
        handler.dispatch(Event::Ready).unwrap();
        handler.close_queue();
        processor.await;

        assert_eq!(*seen.lock().unwrap(), vec!["after:Ready", "after:Ready"]);
    }
}
