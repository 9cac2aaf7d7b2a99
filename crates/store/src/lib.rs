//! Saved-call storage.
//!
//! One SQLite table keyed by sort key. Active calls carry a non-null
//! `active_marker`, covered by a partial index so the per-poll "what is
//! open" query only touches open rows.

mod error;
mod sqlite;

pub use error::StoreError;
pub use sqlite::SqliteStore;
