//! Snapshot store backends.
//!
//! Implements the [`innkeeper_core::SnapshotStore`] contract twice: an
//! in-memory store for tests and ephemeral deployments, and a SQLite store
//! for durable single-node deployments. Both enforce the compare-and-swap
//! discipline on `updated_at` and the import-time state validation.

pub mod in_memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
