//! SQLite store for durable single-node deployments.
//!
//! One row per session, whole-snapshot replace on save. `agent_state`,
//! `constraints`, and the snapshot body are stored in their wire forms so the
//! session-detail surface can serve them without re-shaping. The
//! compare-and-swap on `updated_at` is a conditional UPDATE.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use innkeeper_core::{
    AgentState, Constraints, SessionSummary, Snapshot, SnapshotBody, SnapshotImport,
    SnapshotStore, StoreError,
};

/// A durable SQLite snapshot store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite snapshot store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_snapshots (
                session_id   TEXT PRIMARY KEY,
                tenant_id    TEXT NOT NULL,
                user_id_hash TEXT NOT NULL,
                agent_state  TEXT NOT NULL,
                constraints  TEXT NOT NULL,
                snapshot     TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("session_snapshots table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_session_snapshots_updated_at \
             ON session_snapshots(updated_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("updated_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Fixed-width RFC 3339 so string comparison matches timestamp order.
    fn fmt_ts(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> Result<Snapshot, StoreError> {
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StoreError::Storage(format!("session_id column: {e}")))?;
        let session_id = Uuid::parse_str(&session_id)
            .map_err(|e| StoreError::Storage(format!("session_id parse: {e}")))?;
        let tenant_id: String = row
            .try_get("tenant_id")
            .map_err(|e| StoreError::Storage(format!("tenant_id column: {e}")))?;
        let user_id_hash: String = row
            .try_get("user_id_hash")
            .map_err(|e| StoreError::Storage(format!("user_id_hash column: {e}")))?;
        let agent_state_str: String = row
            .try_get("agent_state")
            .map_err(|e| StoreError::Storage(format!("agent_state column: {e}")))?;
        let constraints_json: String = row
            .try_get("constraints")
            .map_err(|e| StoreError::Storage(format!("constraints column: {e}")))?;
        let body_json: String = row
            .try_get("snapshot")
            .map_err(|e| StoreError::Storage(format!("snapshot column: {e}")))?;
        let updated_at_str: String = row
            .try_get("updated_at")
            .map_err(|e| StoreError::Storage(format!("updated_at column: {e}")))?;

        let agent_state: AgentState = agent_state_str
            .parse()
            .map_err(|_| StoreError::Storage(format!("stored agent_state: {agent_state_str}")))?;
        let constraints: Constraints = serde_json::from_str(&constraints_json)
            .map_err(|e| StoreError::Storage(format!("stored constraints: {e}")))?;
        let body: SnapshotBody = serde_json::from_str(&body_json)
            .map_err(|e| StoreError::Storage(format!("stored snapshot body: {e}")))?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Storage(format!("stored updated_at: {e}")))?;

        let mut snapshot = Snapshot::new(session_id, tenant_id, user_id_hash);
        snapshot.agent_state = agent_state;
        snapshot.constraints = constraints;
        snapshot.turns = body.turns;
        snapshot.recommended_offers = body.recommended_offers;
        snapshot.offers_fingerprint = body.offers_fingerprint;
        snapshot.recent_trace_ids = body.recent_trace_ids;
        snapshot.updated_at = updated_at;
        Ok(snapshot)
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<Snapshot>, StoreError> {
        let row = sqlx::query(
            "SELECT session_id, tenant_id, user_id_hash, agent_state, constraints, snapshot, updated_at \
             FROM session_snapshots WHERE session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("load failed: {e}")))?;

        row.as_ref().map(Self::row_to_snapshot).transpose()
    }

    async fn save(
        &self,
        snapshot: &Snapshot,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let constraints_json = serde_json::to_string(&snapshot.constraints)
            .map_err(|e| StoreError::Storage(format!("serialize constraints: {e}")))?;
        let body_json = serde_json::to_string(&snapshot.body())
            .map_err(|e| StoreError::Storage(format!("serialize snapshot body: {e}")))?;

        match expected_updated_at {
            Some(expected) => {
                let result = sqlx::query(
                    "UPDATE session_snapshots \
                     SET tenant_id = ?, user_id_hash = ?, agent_state = ?, constraints = ?, \
                         snapshot = ?, updated_at = ? \
                     WHERE session_id = ? AND updated_at = ?",
                )
                .bind(&snapshot.tenant_id)
                .bind(&snapshot.user_id_hash)
                .bind(snapshot.agent_state.to_string())
                .bind(&constraints_json)
                .bind(&body_json)
                .bind(Self::fmt_ts(snapshot.updated_at))
                .bind(snapshot.session_id.to_string())
                .bind(Self::fmt_ts(expected))
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(format!("save failed: {e}")))?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict {
                        session_id: snapshot.session_id,
                    });
                }
                Ok(())
            }
            None => {
                sqlx::query(
                    "INSERT INTO session_snapshots \
                     (session_id, tenant_id, user_id_hash, agent_state, constraints, snapshot, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?) \
                     ON CONFLICT (session_id) DO UPDATE SET \
                       tenant_id = excluded.tenant_id, \
                       user_id_hash = excluded.user_id_hash, \
                       agent_state = excluded.agent_state, \
                       constraints = excluded.constraints, \
                       snapshot = excluded.snapshot, \
                       updated_at = excluded.updated_at",
                )
                .bind(snapshot.session_id.to_string())
                .bind(&snapshot.tenant_id)
                .bind(&snapshot.user_id_hash)
                .bind(snapshot.agent_state.to_string())
                .bind(&constraints_json)
                .bind(&body_json)
                .bind(Self::fmt_ts(snapshot.updated_at))
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(format!("save failed: {e}")))?;
                Ok(())
            }
        }
    }

    async fn import(&self, import: SnapshotImport) -> Result<(), StoreError> {
        let snapshot = import.validate()?;
        self.save(&snapshot, None).await
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT session_id, updated_at FROM session_snapshots \
             ORDER BY updated_at DESC LIMIT 200",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("list failed: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row
                    .try_get("session_id")
                    .map_err(|e| StoreError::Storage(format!("session_id column: {e}")))?;
                let ts: String = row
                    .try_get("updated_at")
                    .map_err(|e| StoreError::Storage(format!("updated_at column: {e}")))?;
                Ok(SessionSummary {
                    session_id: Uuid::parse_str(&id)
                        .map_err(|e| StoreError::Storage(format!("session_id parse: {e}")))?,
                    updated_at: DateTime::parse_from_rfc3339(&ts)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| StoreError::Storage(format!("updated_at parse: {e}")))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let store = SqliteStore::new(path.to_str().unwrap()).await.unwrap();
        (dir, store)
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(Uuid::new_v4(), "t_default", "hash")
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let (_dir, store) = temp_store().await;
        let mut snap = snapshot();
        snap.constraints.city = Some("Austin".into());
        snap.agent_state = AgentState::CollectingConstraints;
        store.save(&snap, None).await.unwrap();

        let loaded = store.load(snap.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.session_id, snap.session_id);
        assert_eq!(loaded.agent_state, AgentState::CollectingConstraints);
        assert_eq!(loaded.constraints, snap.constraints);
    }

    #[tokio::test]
    async fn cas_conflict_on_stale_version() {
        let (_dir, store) = temp_store().await;
        let mut snap = snapshot();
        store.save(&snap, None).await.unwrap();
        let loaded_at = snap.updated_at;

        snap.touch();
        store.save(&snap, Some(loaded_at)).await.unwrap();

        let mut stale = snap.clone();
        stale.touch();
        let err = store.save(&stale, Some(loaded_at)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn list_newest_first() {
        let (_dir, store) = temp_store().await;
        let mut a = snapshot();
        store.save(&a, None).await.unwrap();
        let b = snapshot();
        store.save(&b, None).await.unwrap();
        a.touch();
        a.touch();
        store.save(&a, None).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, a.session_id);
    }

    #[tokio::test]
    async fn import_validates_before_writing() {
        let (_dir, store) = temp_store().await;
        let err = store
            .import(SnapshotImport {
                session_id: Uuid::new_v4(),
                tenant_id: "t_default".into(),
                user_id_hash: "hash".into(),
                agent_state: "UNKNOWN_STATE".into(),
                constraints: serde_json::json!({}),
                snapshot: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidImport(_)));
        assert!(store.list().await.unwrap().is_empty());
    }
}
