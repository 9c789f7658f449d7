//! zmai storage crate - durable conversation logs and metadata.
//!
//! Defines the `ConversationStore` contract and two interchangeable
//! backends: a WAL-mode SQLite database with migrations, and a flat
//! directory holding one JSON file per conversation plus a metadata file.

pub mod db;
pub mod file_store;
pub mod migrations;
pub mod repository;
pub mod store;

pub use db::Database;
pub use file_store::FileConversationStore;
pub use repository::SqliteConversationStore;
pub use store::ConversationStore;
