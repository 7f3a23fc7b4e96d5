//! Main Catalog struct tying all components together.

use crate::bio::{BioCache, BioCacheConfig, BioCacheStats, BioSource, Delay};
use crate::books::BookTable;
use crate::error::Result;
use crate::subscriptions::{BookStream, ChangeNotifier, SubscriptionConfig, SubscriptionId};
use crate::types::{Author, Book, BookId, BookPatch, CatalogStats};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Catalog configuration.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    /// Start with the seed books.
    pub seed: bool,

    /// Subscriber channel settings.
    pub subscription: SubscriptionConfig,

    /// Author bio cache settings.
    pub bio: BioCacheConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            seed: true,
            subscription: SubscriptionConfig::default(),
            bio: BioCacheConfig::default(),
        }
    }
}

/// The book catalog.
///
/// Provides a unified interface for:
/// - Reading and writing books
/// - Subscribing to newly added books
/// - Looking up cached author biographies
///
/// Construct one per process and share it by reference (or `Arc`) with
/// whatever serves it.
pub struct Catalog {
    books: BookTable,

    notifier: ChangeNotifier,

    bios: BioCache,

    /// Held across insert + publish so subscribers see books in id order.
    write_lock: Mutex<()>,
}

impl Catalog {
    /// Create a catalog. Bio fetches sleep for `config.bio.fetch_latency`.
    pub fn new(config: CatalogConfig) -> Self {
        let bios = BioCache::new(config.bio.clone());
        Self::with_bio_cache(config, bios)
    }

    /// Create a catalog whose simulated bio fetches use `delay`.
    pub fn with_delay(config: CatalogConfig, delay: Arc<dyn Delay>) -> Self {
        let bios = BioCache::with_delay(config.bio.clone(), delay);
        Self::with_bio_cache(config, bios)
    }

    /// Create a catalog backed by a custom bio source.
    pub fn with_bio_source(config: CatalogConfig, source: Arc<dyn BioSource>) -> Self {
        let bios = BioCache::with_source(&config.bio, source);
        Self::with_bio_cache(config, bios)
    }

    fn with_bio_cache(config: CatalogConfig, bios: BioCache) -> Self {
        let books = if config.seed {
            BookTable::seeded()
        } else {
            BookTable::new()
        };
        info!(
            books = books.book_count(),
            authors = books.author_count(),
            "Catalog initialized"
        );

        Self {
            books,
            notifier: ChangeNotifier::with_config(config.subscription),
            bios,
            write_lock: Mutex::new(()),
        }
    }

    // --- Book Operations ---

    /// All books in insertion order.
    pub fn list_books(&self) -> Vec<Book> {
        self.books.list()
    }

    /// Get a book by ID.
    pub fn get_book(&self, id: BookId) -> Result<Book> {
        self.books.get(id)
    }

    /// Add a book and hand it to every subscriber before returning.
    ///
    /// A subscriber that cannot take the book is dropped; the add still
    /// succeeds.
    pub fn add_book(&self, title: &str, author: &str) -> Book {
        let _lock = self.write_lock.lock();

        let book = self.books.insert(title, author);
        let delivered = self.notifier.publish(&book);
        debug!(book = %book.id, delivered = delivered, "Book added");

        book
    }

    /// Apply a partial update. Subscribers are not notified.
    pub fn update_book(&self, id: BookId, patch: BookPatch) -> Result<Book> {
        let _lock = self.write_lock.lock();

        let book = self.books.update(id, &patch)?;
        debug!(book = %id, "Book updated");
        Ok(book)
    }

    /// Delete a book. Returns whether it existed.
    pub fn delete_book(&self, id: BookId) -> bool {
        let _lock = self.write_lock.lock();

        let removed = self.books.remove(id);
        debug!(book = %id, removed = removed, "Book delete");
        removed
    }

    // --- Author Operations ---

    /// Look up an author by name.
    pub fn get_author(&self, name: &str) -> Option<Author> {
        self.books.author(name)
    }

    /// All authors, ordered by id.
    pub fn list_authors(&self) -> Vec<Author> {
        self.books.authors()
    }

    /// Get an author's biography, fetching it on first request.
    pub fn get_author_bio(&self, name: &str) -> String {
        self.bios.get(name)
    }

    /// Like [`get_author_bio`](Self::get_author_bio), but returns `None`
    /// if no biography arrives within `timeout`. A fetch started here
    /// still completes and is cached.
    pub fn get_author_bio_timeout(&self, name: &str, timeout: Duration) -> Option<String> {
        self.bios.get_timeout(name, timeout)
    }

    // --- Subscription Operations ---

    /// Subscribe to books added from now on.
    pub fn subscribe_book_events(&self) -> BookStream {
        self.notifier.subscribe()
    }

    /// Unsubscribe. Safe to call more than once.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // --- Stats ---

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            books: self.books.book_count(),
            authors: self.books.author_count(),
            subscribers: self.notifier.subscription_count(),
            cached_bios: self.bios.len(),
        }
    }

    pub fn bio_stats(&self) -> BioCacheStats {
        self.bios.stats()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}
