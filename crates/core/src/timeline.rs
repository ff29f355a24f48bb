//! The tool timeline — one record per tool invocation attempt within a turn.
//!
//! Entries are owned by the turn that produced them and never mutated after
//! the turn completes. Retries of the same logical call share one entry with
//! an accumulated `retries` count.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one logical tool call.
///
/// `BudgetExceeded` is deliberately distinct from `Error`: it records a
/// guardrail decision, not a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineStatus {
    Ok,
    Error,
    Timeout,
    BudgetExceeded,
}

/// A record of one tool invocation (attempted or skipped-by-budget).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub tool_name: String,
    pub status: TimelineStatus,
    /// Wall-clock latency across all attempts of this logical call.
    pub latency_ms: u64,
    /// Retry attempts actually made (0 when the first attempt settled it).
    #[serde(default)]
    pub retries: u32,

    // Debug fields for the session inspection UI. Size-bounded at capture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_preview: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_counts: Option<BTreeMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TimelineEntry {
    /// A minimal entry; dispatcher fills in the debug fields it has.
    pub fn new(tool_name: impl Into<String>, status: TimelineStatus) -> Self {
        Self {
            tool_name: tool_name.into(),
            status,
            latency_ms: 0,
            retries: 0,
            payload: None,
            result_preview: None,
            result_counts: None,
            response_keys: None,
            path: None,
            url: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TimelineStatus::BudgetExceeded).unwrap(),
            "\"budget_exceeded\""
        );
        assert_eq!(serde_json::to_string(&TimelineStatus::Ok).unwrap(), "\"ok\"");
    }

    #[test]
    fn optional_debug_fields_are_omitted() {
        let entry = TimelineEntry::new("search_offers", TimelineStatus::Ok);
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("payload").is_none());
        assert!(json.get("url").is_none());
        assert_eq!(json["retries"], 0);
    }

    #[test]
    fn round_trip_with_counts() {
        let mut entry = TimelineEntry::new("search_offers", TimelineStatus::Ok);
        entry.result_counts = Some(BTreeMap::from([("offers".to_string(), 7)]));
        entry.latency_ms = 42;
        let json = serde_json::to_string(&entry).unwrap();
        let back: TimelineEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
