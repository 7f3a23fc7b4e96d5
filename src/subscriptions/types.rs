//! Subscription types for book change notifications.

use serde::{Deserialize, Serialize};

/// Configuration for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionConfig {
    /// Max buffered books before the subscriber is dropped.
    /// `Some(0)` is treated as `Some(1)`.
    /// Default: None (unbounded)
    pub buffer_size: Option<usize>,
}

impl SubscriptionConfig {
    /// Bounded buffers; subscribers that fall `size` books behind are dropped.
    /// A size of 0 still buffers one book.
    pub fn bounded(size: usize) -> Self {
        Self {
            buffer_size: Some(size),
        }
    }
}

/// Why a subscription ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed or the stream was dropped.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);
