//! Change notifications for newly added books.
//!
//! Every subscriber owns one channel in the notifier's registry. Adding a
//! book hands it to each channel; the subscriber pulls books from its
//! [`BookStream`] in the order they were published.
//!
//! Subscriptions end when:
//! - the stream is dropped (the channel is deregistered immediately)
//! - a [`SubscriptionHandle`] is cancelled, possibly from another thread
//! - a bounded buffer overflows
//!
//! # Example
//!
//! ```ignore
//! let notifier = ChangeNotifier::new();
//! let stream = notifier.subscribe();
//!
//! for book in stream {
//!     println!("New book: {}", book.title);
//! }
//! ```

mod manager;
mod stream;
mod types;

pub use manager::ChangeNotifier;
pub use stream::{BookStream, SubscriptionHandle};
pub use types::{DropReason, SubscriptionConfig, SubscriptionId};
