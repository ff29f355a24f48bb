//! Per-turn guardrail budgets for tool usage.
//!
//! The policy is immutable and evaluated fresh each turn; it carries no state
//! across turns. Tripping a guardrail is a deliberate, observable degradation,
//! distinct from a tool-level failure.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff schedule for retrying transient tool failures.
///
/// Delays grow exponentially from `base_ms` by `factor`, capped at `max_ms`.
/// Jitter (applied by the dispatcher) spreads concurrent retries out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryBackoff {
    #[serde(default = "default_backoff_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub factor: f64,
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_backoff_base_ms() -> u64 {
    100
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_backoff_max_ms() -> u64 {
    2_000
}
fn default_true() -> bool {
    true
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base_ms(),
            factor: default_backoff_factor(),
            max_ms: default_backoff_max_ms(),
            jitter: default_true(),
        }
    }
}

impl RetryBackoff {
    /// Base delay before retry number `retry` (1-based), without jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let ms = (self.base_ms as f64 * self.factor.powi(exp as i32)) as u64;
        Duration::from_millis(ms.min(self.max_ms))
    }
}

/// The immutable per-turn budget for tool invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailPolicy {
    /// Hard cap on tool calls per turn; exceeding it aborts remaining
    /// planned calls with status `budget_exceeded`.
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls_per_turn: u32,
    /// Cumulative wall-clock deadline for the whole turn (not per call).
    #[serde(default = "default_wall_clock_budget_ms")]
    pub wall_clock_budget_ms: u64,
    /// Deadline for a single attempt; a call exceeding it is abandoned.
    #[serde(default = "default_per_call_timeout_ms")]
    pub per_call_timeout_ms: u64,
    /// Retries allowed per logical call for the transient failure class.
    #[serde(default = "default_max_retries")]
    pub max_retries_per_call: u32,
    #[serde(default)]
    pub retry_backoff: RetryBackoff,
}

fn default_max_tool_calls() -> u32 {
    8
}
fn default_wall_clock_budget_ms() -> u64 {
    8_000
}
fn default_per_call_timeout_ms() -> u64 {
    2_500
}
fn default_max_retries() -> u32 {
    2
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            max_tool_calls_per_turn: default_max_tool_calls(),
            wall_clock_budget_ms: default_wall_clock_budget_ms(),
            per_call_timeout_ms: default_per_call_timeout_ms(),
            max_retries_per_call: default_max_retries(),
            retry_backoff: RetryBackoff::default(),
        }
    }
}

impl GuardrailPolicy {
    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_millis(self.per_call_timeout_ms)
    }

    pub fn wall_clock_budget(&self) -> Duration {
        Duration::from_millis(self.wall_clock_budget_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let policy = GuardrailPolicy::default();
        assert_eq!(policy.max_tool_calls_per_turn, 8);
        assert_eq!(policy.wall_clock_budget_ms, 8_000);
        assert_eq!(policy.per_call_timeout_ms, 2_500);
        assert_eq!(policy.max_retries_per_call, 2);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let backoff = RetryBackoff::default();
        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(400));
        // Far past the cap
        assert_eq!(backoff.delay_for(12), Duration::from_millis(2_000));
    }

    #[test]
    fn policy_deserializes_from_partial_toml_shaped_json() {
        let policy: GuardrailPolicy =
            serde_json::from_str(r#"{"max_tool_calls_per_turn": 3}"#).unwrap();
        assert_eq!(policy.max_tool_calls_per_turn, 3);
        assert_eq!(policy.per_call_timeout_ms, 2_500);
    }
}
