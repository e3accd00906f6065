//! Data ingestion and storage
//!
//! CSV loading and cleaning, the ordered match stream, and SQLite storage.

pub mod database;
pub mod loader;
pub mod stream;

pub use database::{Database, DatabaseStats, RatingEntry};
pub use loader::{load_directory, CleaningReport};
pub use stream::MatchStream;
