//! Subscriber side of a book subscription.

use crate::types::Book;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::manager::Registry;
use super::types::{DropReason, SubscriptionId};

/// Lazy, blocking stream of newly added books.
///
/// Not restartable: once it ends it stays ended. Dropping the stream
/// deregisters the subscription.
pub struct BookStream {
    id: SubscriptionId,
    receiver: Receiver<Book>,
    registry: Weak<Registry>,
    reason: Arc<Mutex<Option<DropReason>>>,
}

impl BookStream {
    pub(crate) fn new(
        id: SubscriptionId,
        receiver: Receiver<Book>,
        registry: Weak<Registry>,
        reason: Arc<Mutex<Option<DropReason>>>,
    ) -> Self {
        Self {
            id,
            receiver,
            registry,
            reason,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// A handle that can cancel this subscription from elsewhere.
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            id: self.id,
            registry: self.registry.clone(),
        }
    }

    /// Receive the next book (blocking).
    ///
    /// Returns `None` once the subscription has been removed and every
    /// buffered book has been read.
    pub fn recv(&self) -> Option<Book> {
        self.receiver.recv().ok()
    }

    /// Try to receive a book (non-blocking).
    pub fn try_recv(&self) -> Result<Book, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Book, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Why the subscription ended, or `None` while it is still live.
    pub fn drop_reason(&self) -> Option<DropReason> {
        self.reason.lock().clone()
    }

    /// Cancel the subscription. Books already buffered can still be read.
    pub fn cancel(&self) -> bool {
        self.handle().cancel()
    }
}

impl Iterator for BookStream {
    type Item = Book;

    fn next(&mut self) -> Option<Book> {
        self.recv()
    }
}

impl Drop for BookStream {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id, DropReason::Unsubscribed);
        }
    }
}

/// Cloneable, thread-safe handle to cancel a subscription.
///
/// Cancelling wakes a consumer blocked in [`BookStream::recv`].
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    registry: Weak<Registry>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Cancel the subscription. Idempotent; returns whether this call
    /// removed it.
    pub fn cancel(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id, DropReason::Unsubscribed),
            None => false,
        }
    }

    /// Whether the subscription is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.contains(self.id))
            .unwrap_or(false)
    }
}
