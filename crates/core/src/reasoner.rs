//! Reasoner trait — the abstraction over the external reasoning capability.
//!
//! The reasoner turns a free-text user message into a structured
//! interpretation against the current constraints. It is the only component
//! that reads natural language; the orchestrator consumes nothing but the
//! structured output. Implementations: an OpenAI-compatible HTTP interpreter,
//! and a deterministic scripted stub for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constraints::{ConstraintDelta, Constraints};
use crate::error::ReasonerError;

/// What the user is trying to do with this message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Supplying or refining booking constraints.
    ProvideInfo,
    /// Picking one of the presented offers.
    SelectOffer,
    /// Abandoning the session.
    Cancel,
    /// Anything else, including unparseable input.
    Other,
}

/// Structured interpretation of one user message.
///
/// The contract is total: even unparseable input yields an `Other` intent
/// with an empty delta, never an unstructured failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub intent: Intent,
    #[serde(default)]
    pub delta: ConstraintDelta,
    /// Exact offer id when the message names one. Always takes precedence
    /// over fuzzy selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_offer_id: Option<String>,
    /// Fuzzy selection phrase ("the cheaper one", a hotel name) when no
    /// exact id was given. The engine resolves it against presented offers
    /// and asks for disambiguation rather than guessing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_hint: Option<String>,
}

impl Interpretation {
    /// The degraded interpretation for input the model could not structure.
    pub fn other() -> Self {
        Self {
            intent: Intent::Other,
            delta: ConstraintDelta::default(),
            selected_offer_id: None,
            selection_hint: None,
        }
    }

    pub fn provide_info(delta: ConstraintDelta) -> Self {
        Self {
            intent: Intent::ProvideInfo,
            delta,
            selected_offer_id: None,
            selection_hint: None,
        }
    }

    pub fn select_offer(offer_id: impl Into<String>) -> Self {
        Self {
            intent: Intent::SelectOffer,
            delta: ConstraintDelta::default(),
            selected_offer_id: Some(offer_id.into()),
            selection_hint: None,
        }
    }

    pub fn cancel() -> Self {
        Self {
            intent: Intent::Cancel,
            delta: ConstraintDelta::default(),
            selected_offer_id: None,
            selection_hint: None,
        }
    }
}

/// The external reasoning capability, consumed through a narrow contract so
/// the orchestrator is testable with a deterministic stub.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// The implementation name (for logs and diagnostics).
    fn name(&self) -> &str;

    /// Interpret one user message against the current constraints.
    async fn interpret(
        &self,
        message: &str,
        constraints: &Constraints,
    ) -> std::result::Result<Interpretation, ReasonerError>;
}
