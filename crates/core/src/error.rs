//! Error types for the Innkeeper domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Innkeeper operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Session orchestration errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Reasoner errors ---
    #[error("Reasoner error: {0}")]
    Reasoner(#[from] ReasonerError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the external reasoning capability.
#[derive(Debug, Clone, Error)]
pub enum ReasonerError {
    #[error("Reasoner not configured: {0}")]
    NotConfigured(String),

    #[error("Model request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Model request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures from tool invocation through the dispatcher.
///
/// `UnknownTool` is the programming-error class: fatal, never retried.
/// `Timeout` and `Transport` are the transient class, retried per the
/// guardrail policy. `Rejected` is the non-retryable tool-side class.
/// `BudgetExhausted` is not a tool failure at all — it is a deliberate,
/// observable degradation imposed by the guardrails.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0} — not present in the registry")]
    UnknownTool(String),

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Tool transport failed: {tool_name} — {reason}")]
    Transport { tool_name: String, reason: String },

    #[error("Tool rejected request: {tool_name} (status {status}) — {reason}")]
    Rejected {
        tool_name: String,
        status: u16,
        reason: String,
    },

    #[error("Tool budget exhausted before calling {tool_name}")]
    BudgetExhausted { tool_name: String },
}

impl ToolError {
    /// Whether the failure class is transient and eligible for retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }
}

/// Failures from the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("Concurrent modification of session {session_id}: snapshot changed underneath the save")]
    Conflict { session_id: uuid::Uuid },

    #[error("Invalid imported state: {0}")]
    InvalidImport(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failures from turn orchestration.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A save conflicted twice in a row; the caller may retry the turn.
    #[error("Turn conflict on session {session_id}: retried once, still conflicting")]
    TurnConflict { session_id: uuid::Uuid },

    #[error(transparent)]
    Reasoner(#[from] ReasonerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_retry_classes() {
        assert!(ToolError::Timeout {
            tool_name: "search_offers".into(),
            timeout_ms: 2500,
        }
        .is_retryable());
        assert!(ToolError::Transport {
            tool_name: "search_offers".into(),
            reason: "connection refused".into(),
        }
        .is_retryable());
        assert!(!ToolError::Rejected {
            tool_name: "search_offers".into(),
            status: 422,
            reason: "schema violation".into(),
        }
        .is_retryable());
        assert!(!ToolError::UnknownTool("bogus".into()).is_retryable());
        assert!(!ToolError::BudgetExhausted {
            tool_name: "check_offer".into(),
        }
        .is_retryable());
    }

    #[test]
    fn store_conflict_displays_session() {
        let id = uuid::Uuid::new_v4();
        let err = Error::Store(StoreError::Conflict { session_id: id });
        assert!(err.to_string().contains(&id.to_string()));
    }
}
