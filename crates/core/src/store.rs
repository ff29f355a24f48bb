//! SnapshotStore trait — durable keyed session state.
//!
//! Saves are whole-snapshot atomic replaces, last-writer-wins at snapshot
//! granularity. Field-level merging happens in the session engine before the
//! save, never in the store. The optional compare-and-swap on `updated_at`
//! is how concurrent turns against the same session are detected once
//! multiple orchestrator instances run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::snapshot::{SessionSummary, Snapshot, SnapshotImport};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The backend name (for logs and diagnostics).
    fn name(&self) -> &str;

    /// Load a snapshot, or None when the session does not exist.
    async fn load(&self, session_id: Uuid) -> std::result::Result<Option<Snapshot>, StoreError>;

    /// Atomically replace the snapshot keyed by its `session_id`.
    ///
    /// When `expected_updated_at` is Some, the save only succeeds if the
    /// stored snapshot still carries that timestamp; otherwise
    /// `StoreError::Conflict` is returned and nothing is written. None
    /// writes unconditionally (first save, import/restore).
    async fn save(
        &self,
        snapshot: &Snapshot,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> std::result::Result<(), StoreError>;

    /// Accept externally supplied state for replay/restore.
    ///
    /// Implementations must validate via [`SnapshotImport::validate`] and
    /// reject unknown states rather than silently defaulting.
    async fn import(&self, import: SnapshotImport) -> std::result::Result<(), StoreError>;

    /// Session identifiers ordered by `updated_at` descending, for
    /// resumption UIs.
    async fn list(&self) -> std::result::Result<Vec<SessionSummary>, StoreError>;
}
