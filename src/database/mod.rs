// Database module
// SQLite-backed document store for items and embedding vectors

pub mod sqlite;

pub use sqlite::*;
