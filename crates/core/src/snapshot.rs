//! The session snapshot — the full persisted state of a session between turns.
//!
//! Exclusively owned by the session engine during a turn (single writer),
//! durably held by the snapshot store between turns. `turns` is append-only:
//! history is never rewritten, only extended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constraints::Constraints;
use crate::error::StoreError;
use crate::offer::Offer;
use crate::state::AgentState;
use crate::timeline::TimelineEntry;

/// One user-message/assistant-response exchange, with everything needed to
/// replay and audit the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub ts: DateTime<Utc>,
    pub trace_id: String,
    pub user_message: String,
    pub assistant_message: String,
    pub agent_state: AgentState,
    #[serde(default)]
    pub tool_timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub recommended_offers: Vec<Offer>,
}

/// The conversation-level portion of a snapshot, exposed as the `snapshot`
/// document on the session-detail and import surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SnapshotBody {
    #[serde(default)]
    pub turns: Vec<TurnRecord>,
    #[serde(default)]
    pub recommended_offers: Vec<Offer>,
    /// Fingerprint of the constraints that produced `recommended_offers`;
    /// a mismatch on a later turn invalidates the cached offers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offers_fingerprint: Option<String>,
    #[serde(default)]
    pub recent_trace_ids: Vec<String>,
}

/// The full persisted state of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_id: Uuid,
    pub tenant_id: String,
    pub user_id_hash: String,
    pub agent_state: AgentState,
    pub constraints: Constraints,
    #[serde(default)]
    pub turns: Vec<TurnRecord>,
    #[serde(default)]
    pub recommended_offers: Vec<Offer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offers_fingerprint: Option<String>,
    #[serde(default)]
    pub recent_trace_ids: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    /// A fresh session in the only valid initial state.
    pub fn new(session_id: Uuid, tenant_id: impl Into<String>, user_id_hash: impl Into<String>) -> Self {
        Self {
            session_id,
            tenant_id: tenant_id.into(),
            user_id_hash: user_id_hash.into(),
            agent_state: AgentState::Init,
            constraints: Constraints::default(),
            turns: Vec::new(),
            recommended_offers: Vec::new(),
            offers_fingerprint: None,
            recent_trace_ids: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Append a completed turn. Turns are never altered or removed.
    pub fn push_turn(&mut self, turn: TurnRecord) {
        self.turns.push(turn);
    }

    /// Bump `updated_at`, keeping it monotonically non-decreasing even if the
    /// system clock steps backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        } else {
            self.updated_at += chrono::Duration::microseconds(1);
        }
    }

    /// The conversation-level body, as exposed on the detail/export surface.
    pub fn body(&self) -> SnapshotBody {
        SnapshotBody {
            turns: self.turns.clone(),
            recommended_offers: self.recommended_offers.clone(),
            offers_fingerprint: self.offers_fingerprint.clone(),
            recent_trace_ids: self.recent_trace_ids.clone(),
        }
    }
}

/// A row of the session listing, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// Externally supplied session state for replay/restore.
///
/// Validation happens before anything is persisted: unknown agent states and
/// malformed constraint/body documents are rejected, never silently coerced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotImport {
    pub session_id: Uuid,
    pub tenant_id: String,
    pub user_id_hash: String,
    pub agent_state: String,
    pub constraints: serde_json::Value,
    pub snapshot: serde_json::Value,
}

impl SnapshotImport {
    /// Validate the import against the known state set and the typed model,
    /// producing a persistable snapshot.
    pub fn validate(self) -> std::result::Result<Snapshot, StoreError> {
        let agent_state: AgentState = self.agent_state.parse()?;
        let constraints: Constraints = serde_json::from_value(self.constraints)
            .map_err(|e| StoreError::InvalidImport(format!("malformed constraints: {e}")))?;
        let body: SnapshotBody = serde_json::from_value(self.snapshot)
            .map_err(|e| StoreError::InvalidImport(format!("malformed snapshot body: {e}")))?;

        let mut snapshot = Snapshot::new(self.session_id, self.tenant_id, self.user_id_hash);
        snapshot.agent_state = agent_state;
        snapshot.constraints = constraints;
        snapshot.turns = body.turns;
        snapshot.recommended_offers = body.recommended_offers;
        snapshot.offers_fingerprint = body.offers_fingerprint;
        snapshot.recent_trace_ids = body.recent_trace_ids;
        Ok(snapshot)
    }
}
