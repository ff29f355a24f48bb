//! `innkeeper doctor` — Diagnose configuration and storage.

use innkeeper_config::AppConfig;
use innkeeper_core::SnapshotStore;
use innkeeper_store::SqliteStore;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Innkeeper Doctor");
    println!("================");

    if config_path.exists() {
        println!("  ✅ Config file: {}", config_path.display());
    } else {
        println!(
            "  ⚠️  No config file at {} — running on defaults",
            config_path.display()
        );
    }

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Config parses and validates");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            return Err(e.into());
        }
    };

    println!("  Tenant:     {}", config.tenant_id);
    println!("  Tools:      {}", config.tools.base_url);
    println!("  Reasoner:   {} ({})", config.reasoner.base_url, config.reasoner.model);
    println!(
        "  Guardrails: {} calls / {}ms per turn, {}ms per call, {} retries",
        config.guardrails.max_tool_calls_per_turn,
        config.guardrails.wall_clock_budget_ms,
        config.guardrails.per_call_timeout_ms,
        config.guardrails.max_retries_per_call,
    );

    if config.reasoner.api_key.is_some() {
        println!("  ✅ Reasoner API key configured");
    } else {
        println!("  ❌ No reasoner API key — set INNKEEPER_REASONER_API_KEY");
    }

    match config.store.backend.as_str() {
        "in_memory" => println!("  ⚠️  Store: in_memory — sessions will not survive restart"),
        _ => match SqliteStore::new(&config.store.path).await {
            Ok(store) => {
                let count = store.list().await.map(|s| s.len()).unwrap_or(0);
                println!("  ✅ Store: sqlite at {} ({count} sessions)", config.store.path);
            }
            Err(e) => println!("  ❌ Store unreachable: {e}"),
        },
    }

    Ok(())
}
