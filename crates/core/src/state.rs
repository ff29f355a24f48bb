//! The conversation state machine.
//!
//! Conversation state is an explicit tagged enumeration with an explicit
//! transition function, not scattered conditional flags. Invalid transitions
//! are rejected at validation time, and unknown states are rejected at the
//! import boundary rather than silently defaulted.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where a session currently sits in its booking conversation.
///
/// `Init` is the only initial state. `Confirmed`, `Failed`, and `Cancelled`
/// are terminal: no further tool calls are issued once reached, though the
/// session remains readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    /// Fresh session, no constraints yet.
    Init,
    /// Awaiting enough information to run a search.
    CollectingConstraints,
    /// Search tool calls in flight.
    Searching,
    /// Offers presented, awaiting the user's pick.
    WaitForSelection,
    /// A selection is being re-verified and re-priced.
    Confirming,
    /// Terminal: booking confirmed.
    Confirmed,
    /// Terminal: unrecoverable turn-level error.
    Failed,
    /// Terminal: user abandoned the session.
    Cancelled,
}

impl AgentState {
    /// All known states, for import validation and diagnostics.
    pub const ALL: [AgentState; 8] = [
        AgentState::Init,
        AgentState::CollectingConstraints,
        AgentState::Searching,
        AgentState::WaitForSelection,
        AgentState::Confirming,
        AgentState::Confirmed,
        AgentState::Failed,
        AgentState::Cancelled,
    ];

    /// Terminal states accept no further transitions and issue no tool calls.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Cancelled)
    }

    /// The explicit transition function.
    ///
    /// Self-transitions are always legal (a turn may end where it started).
    /// Any non-terminal state may reach `Cancelled` (user abandons) or `Init`
    /// (explicit reset clears constraints and starts over).
    pub fn can_transition_to(self, next: AgentState) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Cancelled | Self::Init) {
            return true;
        }
        match self {
            Self::Init => matches!(next, Self::CollectingConstraints),
            Self::CollectingConstraints => matches!(next, Self::Searching),
            Self::Searching => matches!(
                next,
                Self::WaitForSelection | Self::CollectingConstraints | Self::Failed
            ),
            Self::WaitForSelection => matches!(
                next,
                Self::Confirming | Self::Searching | Self::CollectingConstraints
            ),
            Self::Confirming => {
                matches!(next, Self::Confirmed | Self::WaitForSelection | Self::Failed)
            }
            Self::Confirmed | Self::Failed | Self::Cancelled => false,
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::CollectingConstraints => "COLLECTING_CONSTRAINTS",
            Self::Searching => "SEARCHING",
            Self::WaitForSelection => "WAIT_FOR_SELECTION",
            Self::Confirming => "CONFIRMING",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AgentState {
    type Err = crate::error::StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(Self::Init),
            "COLLECTING_CONSTRAINTS" => Ok(Self::CollectingConstraints),
            "SEARCHING" => Ok(Self::Searching),
            "WAIT_FOR_SELECTION" => Ok(Self::WaitForSelection),
            "CONFIRMING" => Ok(Self::Confirming),
            "CONFIRMED" => Ok(Self::Confirmed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(crate::error::StoreError::InvalidImport(format!(
                "unknown agent_state: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_not_terminal() {
        assert!(!AgentState::Init.is_terminal());
        assert!(AgentState::Confirmed.is_terminal());
        assert!(AgentState::Failed.is_terminal());
        assert!(AgentState::Cancelled.is_terminal());
    }

    #[test]
    fn happy_path_transitions() {
        use AgentState::*;
        assert!(Init.can_transition_to(CollectingConstraints));
        assert!(CollectingConstraints.can_transition_to(Searching));
        assert!(Searching.can_transition_to(WaitForSelection));
        assert!(WaitForSelection.can_transition_to(Confirming));
        assert!(Confirming.can_transition_to(Confirmed));
    }

    #[test]
    fn stale_recheck_returns_to_selection() {
        assert!(AgentState::Confirming.can_transition_to(AgentState::WaitForSelection));
    }

    #[test]
    fn refinement_from_selection_re_searches() {
        assert!(AgentState::WaitForSelection.can_transition_to(AgentState::Searching));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        use AgentState::*;
        for terminal in [Confirmed, Failed, Cancelled] {
            for next in AgentState::ALL {
                if next != terminal {
                    assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
                }
            }
        }
    }

    #[test]
    fn any_live_state_can_cancel_or_reset() {
        use AgentState::*;
        for live in [Init, CollectingConstraints, Searching, WaitForSelection, Confirming] {
            assert!(live.can_transition_to(Cancelled));
            assert!(live.can_transition_to(Init) || live == Init);
        }
    }

    #[test]
    fn skipping_the_search_is_invalid() {
        assert!(!AgentState::Init.can_transition_to(AgentState::WaitForSelection));
        assert!(!AgentState::CollectingConstraints.can_transition_to(AgentState::Confirmed));
    }

    #[test]
    fn serde_round_trip_uses_wire_names() {
        let json = serde_json::to_string(&AgentState::WaitForSelection).unwrap();
        assert_eq!(json, "\"WAIT_FOR_SELECTION\"");
        let back: AgentState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AgentState::WaitForSelection);
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert!("DAYDREAMING".parse::<AgentState>().is_err());
        assert_eq!("CONFIRMING".parse::<AgentState>().unwrap(), AgentState::Confirming);
    }
}
