//! `innkeeper sessions` — List persisted sessions, newest first.

use innkeeper_config::AppConfig;
use innkeeper_core::SnapshotStore;
use innkeeper_store::{InMemoryStore, SqliteStore};
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let store: Arc<dyn SnapshotStore> = match config.store.backend.as_str() {
        "in_memory" => Arc::new(InMemoryStore::new()),
        _ => Arc::new(SqliteStore::new(&config.store.path).await?),
    };

    let sessions = store.list().await?;
    if sessions.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }

    println!("{:<38} {}", "SESSION", "UPDATED");
    for session in sessions {
        println!("{:<38} {}", session.session_id, session.updated_at);
    }
    Ok(())
}
