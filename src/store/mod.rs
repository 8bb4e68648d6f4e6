//! Persistence layer: libSQL-backed storage for messages, sender history and templates.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{HistoryStore, MessageStore, TemplateStore};
