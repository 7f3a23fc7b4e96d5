//! Error types for the catalog.

use crate::types::BookId;
use thiserror::Error;

/// Main error type for catalog operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Book not found: {0}")]
    BookNotFound(BookId),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
