//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use innkeeper_core::{SessionSummary, Snapshot, SnapshotImport, SnapshotStore, StoreError};

/// An in-memory store keyed by session id.
/// Useful for testing and deployments where persistence isn't needed.
pub struct InMemoryStore {
    sessions: Arc<RwLock<HashMap<Uuid, Snapshot>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.sessions.read().await.get(&session_id).cloned())
    }

    async fn save(
        &self,
        snapshot: &Snapshot,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if let Some(expected) = expected_updated_at {
            match sessions.get(&snapshot.session_id) {
                Some(existing) if existing.updated_at != expected => {
                    return Err(StoreError::Conflict {
                        session_id: snapshot.session_id,
                    });
                }
                None => {
                    return Err(StoreError::Conflict {
                        session_id: snapshot.session_id,
                    });
                }
                _ => {}
            }
        }
        sessions.insert(snapshot.session_id, snapshot.clone());
        Ok(())
    }

    async fn import(&self, import: SnapshotImport) -> Result<(), StoreError> {
        let snapshot = import.validate()?;
        self.save(&snapshot, None).await
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .map(|s| SessionSummary {
                session_id: s.session_id,
                updated_at: s.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeeper_core::AgentState;

    fn snapshot() -> Snapshot {
        Snapshot::new(Uuid::new_v4(), "t_default", "hash")
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let store = InMemoryStore::new();
        let snap = snapshot();
        store.save(&snap, None).await.unwrap();

        let loaded = store.load(snap.session_id).await.unwrap().unwrap();
        assert_eq!(loaded, snap);
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cas_save_detects_conflict() {
        let store = InMemoryStore::new();
        let mut snap = snapshot();
        store.save(&snap, None).await.unwrap();
        let loaded_at = snap.updated_at;

        // Another writer moves the snapshot forward.
        snap.touch();
        store.save(&snap, Some(loaded_at)).await.unwrap();

        // Saving against the stale version now conflicts.
        let mut stale = snap.clone();
        stale.touch();
        let err = store.save(&stale, Some(loaded_at)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn cas_against_missing_session_conflicts() {
        let store = InMemoryStore::new();
        let snap = snapshot();
        let err = store
            .save(&snap, Some(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let store = InMemoryStore::new();
        let mut first = snapshot();
        store.save(&first, None).await.unwrap();
        let mut second = snapshot();
        second.touch();
        second.touch();
        store.save(&second, None).await.unwrap();
        first.touch();
        first.touch();
        first.touch();
        store.save(&first, None).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, first.session_id);
        assert!(listed[0].updated_at >= listed[1].updated_at);
    }

    #[tokio::test]
    async fn import_rejects_unknown_state() {
        let store = InMemoryStore::new();
        let err = store
            .import(SnapshotImport {
                session_id: Uuid::new_v4(),
                tenant_id: "t_default".into(),
                user_id_hash: "hash".into(),
                agent_state: "SLEEPWALKING".into(),
                constraints: serde_json::json!({}),
                snapshot: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidImport(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_export_round_trip_is_stable() {
        let store = InMemoryStore::new();
        let mut snap = snapshot();
        snap.agent_state = AgentState::CollectingConstraints;
        snap.constraints.city = Some("Austin".into());
        store.save(&snap, None).await.unwrap();

        // Export, import into a second store, export again.
        let exported = store.load(snap.session_id).await.unwrap().unwrap();
        let other = InMemoryStore::new();
        other
            .import(SnapshotImport {
                session_id: exported.session_id,
                tenant_id: exported.tenant_id.clone(),
                user_id_hash: exported.user_id_hash.clone(),
                agent_state: exported.agent_state.to_string(),
                constraints: serde_json::to_value(&exported.constraints).unwrap(),
                snapshot: serde_json::to_value(exported.body()).unwrap(),
            })
            .await
            .unwrap();

        let reexported = other.load(snap.session_id).await.unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&reexported.constraints).unwrap(),
            serde_json::to_value(&exported.constraints).unwrap()
        );
        assert_eq!(
            serde_json::to_value(&reexported.turns).unwrap(),
            serde_json::to_value(&exported.turns).unwrap()
        );
    }
}
