//! Book and author tables.

mod table;

pub use table::{BookTable, SEED_BOOKS};
