//! The live per-turn budget tracker.
//!
//! Wraps an immutable [`GuardrailPolicy`] with the turn's start instant and
//! the number of calls charged so far. Wall-clock is measured against elapsed
//! time since turn start, not summed call latencies, so concurrent calls do
//! not double-charge the budget.

use innkeeper_core::GuardrailPolicy;
use std::time::{Duration, Instant};

pub struct TurnBudget {
    policy: GuardrailPolicy,
    started: Instant,
    calls_used: u32,
}

impl TurnBudget {
    pub fn new(policy: GuardrailPolicy) -> Self {
        Self {
            policy,
            started: Instant::now(),
            calls_used: 0,
        }
    }

    pub fn policy(&self) -> &GuardrailPolicy {
        &self.policy
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Logical tool calls charged this turn (skipped-by-budget calls are not
    /// charged).
    pub fn calls_used(&self) -> u32 {
        self.calls_used
    }

    /// Wall-clock remaining before the turn deadline, or None once exhausted.
    pub fn remaining_wall_clock(&self) -> Option<Duration> {
        let budget = self.policy.wall_clock_budget();
        let elapsed = self.elapsed();
        if elapsed >= budget {
            None
        } else {
            Some(budget - elapsed)
        }
    }

    /// Whether another logical call may start: both the call-count cap and
    /// the wall-clock deadline must have room.
    pub fn can_start_call(&self) -> bool {
        self.calls_used < self.policy.max_tool_calls_per_turn
            && self.remaining_wall_clock().is_some()
    }

    /// Charge one logical call against the count cap.
    pub fn charge_call(&mut self) {
        self.calls_used += 1;
    }
}
