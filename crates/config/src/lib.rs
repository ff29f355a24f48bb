//! Configuration loading, validation, and management for Innkeeper.
//!
//! Loads configuration from `~/.innkeeper/config.toml` with environment
//! variable overrides (`INNKEEPER_*`). Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use innkeeper_core::GuardrailPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
///
/// Maps directly to `~/.innkeeper/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tenant identifier threaded through tool requests and persistence.
    /// Never used for routing decisions in the orchestrator itself.
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,

    /// Per-turn tool budgets.
    #[serde(default)]
    pub guardrails: GuardrailPolicy,

    /// The external reasoning capability.
    #[serde(default)]
    pub reasoner: ReasonerConfig,

    /// Tool endpoint configuration.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Snapshot store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Trace correlation configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_tenant_id() -> String {
    "t_default".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant_id(),
            guardrails: GuardrailPolicy::default(),
            reasoner: ReasonerConfig::default(),
            tools: ToolsConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Provider kind; currently only "openai_compat".
    #[serde(default = "default_reasoner_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_reasoner_base_url")]
    pub base_url: String,

    #[serde(default = "default_reasoner_model")]
    pub model: String,
}

fn default_reasoner_provider() -> String {
    "openai_compat".into()
}
fn default_reasoner_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_reasoner_model() -> String {
    "gpt-4o-mini".into()
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            provider: default_reasoner_provider(),
            api_key: None,
            base_url: default_reasoner_base_url(),
            model: default_reasoner_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Base URL of the tools service hosting search and re-check endpoints.
    #[serde(default = "default_tools_base_url")]
    pub base_url: String,
}

fn default_tools_base_url() -> String {
    "http://localhost:8001".into()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tools_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "in_memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Database path for the sqlite backend.
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    "innkeeper.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Token required on the import/restore endpoint.
    #[serde(default = "default_admin_token")]
    pub admin_token: String,

    /// Origin allowed by CORS (the local dev UI).
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}
fn default_gateway_port() -> u16 {
    8000
}
fn default_admin_token() -> String {
    "dev-admin".into()
}
fn default_allowed_origin() -> String {
    "http://localhost:3000".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            admin_token: default_admin_token(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Capacity of the per-session recent-trace ring buffer.
    #[serde(default = "default_recent_traces")]
    pub recent_traces: usize,
}

fn default_recent_traces() -> usize {
    10
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            recent_traces: default_recent_traces(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("tenant_id", &self.tenant_id)
            .field("guardrails", &self.guardrails)
            .field("reasoner.provider", &self.reasoner.provider)
            .field("reasoner.api_key", &redact(&self.reasoner.api_key))
            .field("reasoner.base_url", &self.reasoner.base_url)
            .field("reasoner.model", &self.reasoner.model)
            .field("tools", &self.tools)
            .field("store", &self.store)
            .field("gateway.host", &self.gateway.host)
            .field("gateway.port", &self.gateway.port)
            .field("gateway.admin_token", &"[REDACTED]")
            .field("gateway.allowed_origin", &self.gateway.allowed_origin)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

impl AppConfig {
    /// The default config file location: `~/.innkeeper/config.toml`.
    pub fn default_path() -> PathBuf {
        if let Some(explicit) = std::env::var_os("INNKEEPER_CONFIG") {
            return PathBuf::from(explicit);
        }
        let home = std::env::var_os("HOME").unwrap_or_default();
        PathBuf::from(home).join(".innkeeper").join("config.toml")
    }

    /// Load from a TOML file, then apply environment overrides and validate.
    /// A missing file yields the defaults (still env-overridable).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            tracing::debug!(path = %path.display(), "No config file — using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `INNKEEPER_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("INNKEEPER_TENANT_ID") {
            self.tenant_id = v;
        }
        if let Ok(v) = std::env::var("INNKEEPER_REASONER_API_KEY") {
            self.reasoner.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("INNKEEPER_REASONER_BASE_URL") {
            self.reasoner.base_url = v;
        }
        if let Ok(v) = std::env::var("INNKEEPER_REASONER_MODEL") {
            self.reasoner.model = v;
        }
        if let Ok(v) = std::env::var("INNKEEPER_TOOLS_BASE_URL") {
            self.tools.base_url = v;
        }
        if let Ok(v) = std::env::var("INNKEEPER_STORE_BACKEND") {
            self.store.backend = v;
        }
        if let Ok(v) = std::env::var("INNKEEPER_STORE_PATH") {
            self.store.path = v;
        }
        if let Ok(v) = std::env::var("INNKEEPER_GATEWAY_PORT")
            && let Ok(port) = v.parse()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("INNKEEPER_ADMIN_TOKEN") {
            self.gateway.admin_token = v;
        }
    }

    /// Validate settings that cannot be expressed through serde defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.store.backend.as_str() {
            "sqlite" | "in_memory" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "store.backend must be \"sqlite\" or \"in_memory\", got \"{other}\""
                )));
            }
        }
        if self.reasoner.provider != "openai_compat" {
            return Err(ConfigError::Invalid(format!(
                "reasoner.provider must be \"openai_compat\", got \"{}\"",
                self.reasoner.provider
            )));
        }
        if self.guardrails.max_tool_calls_per_turn == 0 {
            return Err(ConfigError::Invalid(
                "guardrails.max_tool_calls_per_turn must be at least 1".into(),
            ));
        }
        if self.guardrails.wall_clock_budget_ms == 0 || self.guardrails.per_call_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "guardrail timeouts must be non-zero".into(),
            ));
        }
        if self.gateway.port == 0 {
            return Err(ConfigError::Invalid("gateway.port must be non-zero".into()));
        }
        Ok(())
    }
}
