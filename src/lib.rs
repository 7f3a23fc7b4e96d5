//! # Book Catalog
//!
//! An in-memory book catalog with live notifications for new books and a
//! cached author biography lookup.
//!
//! ## Core Concepts
//!
//! - **Books**: Records with monotonic ids that are never reused
//! - **Authors**: Created on first reference by name, never removed
//! - **Subscriptions**: Per-subscriber channels fed on every add
//! - **Bio cache**: Name-keyed biographies behind a simulated slow fetch
//!
//! ## Example
//!
//! ```ignore
//! use book_catalog::{Catalog, CatalogConfig};
//!
//! let catalog = Catalog::new(CatalogConfig::default());
//!
//! // Listen for new books
//! let stream = catalog.subscribe_book_events();
//!
//! let book = catalog.add_book("Dune", "Frank Herbert");
//! assert_eq!(stream.recv(), Some(book));
//!
//! // Slow the first time, cached afterwards
//! let bio = catalog.get_author_bio("Frank Herbert");
//! ```

pub mod bio;
pub mod books;
pub mod error;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use bio::{
    biography_for, BioCache, BioCacheConfig, BioCacheStats, BioSource, Delay,
    SimulatedBioSource, ThreadSleep,
};
pub use books::{BookTable, SEED_BOOKS};
pub use error::{CatalogError, Result};
pub use store::{Catalog, CatalogConfig};
pub use subscriptions::{
    BookStream, ChangeNotifier, DropReason, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId,
};
pub use types::*;
