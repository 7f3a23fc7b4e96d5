//! Core types for the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a book.
///
/// Assigned from a monotonic counter and never reused, even after the book
/// is deleted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub u64);

impl BookId {
    pub fn next(self) -> Self {
        BookId(self.0 + 1)
    }
}

impl fmt::Debug for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BookId({})", self.0)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an author.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub u64);

impl fmt::Debug for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorId({})", self.0)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single book in the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier (assigned by the catalog).
    pub id: BookId,

    pub title: String,

    /// Author name. Always has a matching [`Author`] record.
    pub author: String,
}

/// An author, keyed by name.
///
/// Created the first time a book references the name and never removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
}

/// Partial update for a book.
///
/// Absent and empty fields both mean "leave unchanged"; an empty title or
/// author cannot be written through a patch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
}

impl BookPatch {
    /// A patch that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the new title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the new author name.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Title to apply, if any.
    pub(crate) fn effective_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }

    /// Author to apply, if any.
    pub(crate) fn effective_author(&self) -> Option<&str> {
        self.author.as_deref().filter(|a| !a.is_empty())
    }

    /// Whether applying this patch would change anything.
    pub fn is_empty(&self) -> bool {
        self.effective_title().is_none() && self.effective_author().is_none()
    }
}

/// Catalog statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub books: usize,
    pub authors: usize,
    pub subscribers: usize,
    pub cached_bios: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_ignores_empty_strings() {
        let patch = BookPatch::new().title("").author("Someone");
        assert_eq!(patch.effective_title(), None);
        assert_eq!(patch.effective_author(), Some("Someone"));
        assert!(!patch.is_empty());

        assert!(BookPatch::new().title("").author("").is_empty());
        assert!(BookPatch::new().is_empty());
    }

    #[test]
    fn test_book_id_ordering() {
        assert!(BookId(1) < BookId(2));
        assert_eq!(BookId(2).next(), BookId(3));
        assert_eq!(BookId(7).to_string(), "7");
    }

    #[test]
    fn test_id_formatting() {
        assert_eq!(AuthorId(4).to_string(), "4");
        assert_eq!(format!("{:?}", AuthorId(4)), "AuthorId(4)");
        assert_eq!(format!("{:?}", BookId(4)), "BookId(4)");
    }
}
