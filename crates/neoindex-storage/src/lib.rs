//! neoindex-storage — pluggable storage backends for NeoIndex.
//!
//! Backends:
//! - [`neoindex_core::MemoryStore`] — in-memory (dev/testing, no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

pub use neoindex_core::MemoryStore;
