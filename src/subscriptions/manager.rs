//! Change notifier broadcasting new books to subscribers.

use crate::types::Book;
use crossbeam_channel::{bounded, unbounded, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::stream::BookStream;
use super::types::{DropReason, SubscriptionConfig, SubscriptionId};

/// Internal subscription state.
struct Subscriber {
    sender: Sender<Book>,
    /// Shared with the stream so it can report why it ended.
    reason: Arc<Mutex<Option<DropReason>>>,
}

impl Subscriber {
    /// Hand a book to the channel. Returns the drop reason on failure.
    fn try_send(&self, book: Book) -> Result<(), DropReason> {
        match self.sender.try_send(book) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DropReason::BufferOverflow),
            // The stream deregisters before its receiver goes away.
            Err(TrySendError::Disconnected(_)) => Err(DropReason::Unsubscribed),
        }
    }
}

/// Active subscriptions, shared between the notifier and its streams.
pub(crate) struct Registry {
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
}

impl Registry {
    /// Remove a subscription. Dropping its sender wakes a blocked consumer.
    ///
    /// Returns false if it was already gone.
    pub(crate) fn remove(&self, id: SubscriptionId, reason: DropReason) -> bool {
        let removed = self.subscribers.write().remove(&id);
        match removed {
            Some(sub) => {
                debug!(subscription = id.0, reason = ?reason, "Subscriber removed");
                *sub.reason.lock() = Some(reason);
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.subscribers.read().contains_key(&id)
    }
}

/// Fans newly added books out to every registered subscriber.
pub struct ChangeNotifier {
    registry: Arc<Registry>,
    config: SubscriptionConfig,
}

impl ChangeNotifier {
    /// Create a notifier with unbounded subscriber channels.
    pub fn new() -> Self {
        Self::with_config(SubscriptionConfig::default())
    }

    /// Create a notifier with custom subscription settings.
    pub fn with_config(config: SubscriptionConfig) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
            config,
        }
    }

    /// Register a new subscriber.
    ///
    /// The stream yields every book published after this call returns.
    /// Dropping it deregisters the subscriber.
    pub fn subscribe(&self) -> BookStream {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = match self.config.buffer_size {
            // A zero-capacity channel would reject every hand-off.
            Some(size) => bounded(size.max(1)),
            None => unbounded(),
        };
        let reason = Arc::new(Mutex::new(None));

        self.registry.subscribers.write().insert(
            id,
            Subscriber {
                sender,
                reason: Arc::clone(&reason),
            },
        );
        debug!(subscription = id.0, "Subscriber registered");

        BookStream::new(id, receiver, Arc::downgrade(&self.registry), reason)
    }

    /// Unsubscribe. Safe to call for ids that are already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.remove(id, DropReason::Unsubscribed)
    }

    /// Hand `book` to every subscriber, returning how many accepted it.
    ///
    /// Subscribers that cannot accept are dropped; the others still get
    /// the book.
    pub fn publish(&self, book: &Book) -> usize {
        let mut failed = Vec::new();
        let mut delivered = 0;

        {
            let subs = self.registry.subscribers.read();
            for (id, sub) in subs.iter() {
                match sub.try_send(book.clone()) {
                    Ok(()) => delivered += 1,
                    Err(reason) => failed.push((*id, reason)),
                }
            }
        }

        for (id, reason) in failed {
            warn!(subscription = id.0, book = %book.id, reason = ?reason, "Dropping subscriber");
            self.registry.remove(id, reason);
        }

        delivered
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.registry.subscribers.read().len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
