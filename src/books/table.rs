//! In-memory book and author tables.

use crate::error::{CatalogError, Result};
use crate::types::{Author, AuthorId, Book, BookId, BookPatch};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Books a seeded catalog starts with, as `(title, author)`.
pub const SEED_BOOKS: &[(&str, &str)] = &[
    ("The Great Gatsby", "F. Scott Fitzgerald"),
    ("1984", "George Orwell"),
];

struct Tables {
    /// Books by id. Ids are monotonic, so key order is insertion order.
    books: BTreeMap<BookId, Book>,

    /// Authors by name.
    authors: HashMap<String, Author>,

    /// Next book id to assign. Never decremented.
    next_id: BookId,
}

impl Tables {
    /// Create the author record for `name` if it is not known yet.
    fn ensure_author(&mut self, name: &str) {
        if self.authors.contains_key(name) {
            return;
        }
        let id = AuthorId(self.authors.len() as u64 + 1);
        self.authors.insert(
            name.to_string(),
            Author {
                id,
                name: name.to_string(),
            },
        );
    }
}

/// Book and author storage.
///
/// Does no notification; the catalog layers subscriptions on top.
pub struct BookTable {
    tables: RwLock<Tables>,
}

impl BookTable {
    /// Create an empty table. The first book gets id 1.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                books: BTreeMap::new(),
                authors: HashMap::new(),
                next_id: BookId(1),
            }),
        }
    }

    /// Create a table holding [`SEED_BOOKS`].
    pub fn seeded() -> Self {
        let table = Self::new();
        for (title, author) in SEED_BOOKS {
            table.insert(title, author);
        }
        table
    }

    /// All books in insertion order.
    pub fn list(&self) -> Vec<Book> {
        self.tables.read().books.values().cloned().collect()
    }

    /// Get a book by id.
    pub fn get(&self, id: BookId) -> Result<Book> {
        self.tables
            .read()
            .books
            .get(&id)
            .cloned()
            .ok_or(CatalogError::BookNotFound(id))
    }

    /// Insert a new book under the next id.
    pub fn insert(&self, title: &str, author: &str) -> Book {
        let mut tables = self.tables.write();

        let id = tables.next_id;
        tables.next_id = id.next();

        let book = Book {
            id,
            title: title.to_string(),
            author: author.to_string(),
        };
        tables.books.insert(id, book.clone());
        tables.ensure_author(author);

        book
    }

    /// Apply a partial update. Empty fields in the patch are ignored.
    pub fn update(&self, id: BookId, patch: &BookPatch) -> Result<Book> {
        let mut tables = self.tables.write();

        if !tables.books.contains_key(&id) {
            return Err(CatalogError::BookNotFound(id));
        }

        if let Some(author) = patch.effective_author() {
            tables.ensure_author(author);
        }

        let book = tables
            .books
            .get_mut(&id)
            .ok_or(CatalogError::BookNotFound(id))?;
        if let Some(title) = patch.effective_title() {
            book.title = title.to_string();
        }
        if let Some(author) = patch.effective_author() {
            book.author = author.to_string();
        }

        Ok(book.clone())
    }

    /// Remove a book. Returns whether it existed.
    pub fn remove(&self, id: BookId) -> bool {
        self.tables.write().books.remove(&id).is_some()
    }

    /// Look up an author by name.
    pub fn author(&self, name: &str) -> Option<Author> {
        self.tables.read().authors.get(name).cloned()
    }

    /// All authors, ordered by id.
    pub fn authors(&self) -> Vec<Author> {
        let mut authors: Vec<Author> = self.tables.read().authors.values().cloned().collect();
        authors.sort_by_key(|a| a.id);
        authors
    }

    pub fn book_count(&self) -> usize {
        self.tables.read().books.len()
    }

    pub fn author_count(&self) -> usize {
        self.tables.read().authors.len()
    }
}

impl Default for BookTable {
    fn default() -> Self {
        Self::new()
    }
}
