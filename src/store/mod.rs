//! Storage layer for rollpoint
//!
//! The transaction log and recovery-point registry live in the primary
//! datastore's own schema, so restoring an earlier snapshot restores the
//! metadata that was current at that moment too.

pub mod connection;
pub mod migrations;
pub mod sqlite;

pub use connection::{ConnectionManager, SqliteConnectionManager};
pub use sqlite::Database;
