//! The guarded tool dispatcher.
//!
//! One `invoke` issues one logical tool call under the turn budget: budget
//! gates before every attempt, a per-attempt timeout, retries with backoff
//! for the transient failure class, and exactly one timeline entry per
//! logical call (retries accumulate into the same entry).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use innkeeper_core::{TimelineEntry, TimelineStatus, ToolError};

use crate::bound::{bound_json, BoundLimits};
use crate::budget::TurnBudget;
use crate::registry::ToolRegistry;
use crate::transport::{ToolTransport, TransportError};

/// The result of one logical tool call plus its timeline record.
///
/// The entry is produced for every call attempted or skipped-by-budget; the
/// caller appends it to the turn's timeline regardless of outcome.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub result: Result<Value, ToolError>,
    pub entry: TimelineEntry,
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    transport: Arc<dyn ToolTransport>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, transport: Arc<dyn ToolTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Issue one logical tool call under the given budget.
    ///
    /// The only hard error is an unknown tool name — a programming error,
    /// fatal and never retried. Every other outcome (including budget
    /// exhaustion) is reported through the [`DispatchOutcome`] so the turn
    /// can degrade deliberately instead of aborting.
    pub async fn invoke(
        &self,
        tool_name: &str,
        request: Value,
        budget: &mut TurnBudget,
    ) -> Result<DispatchOutcome, ToolError> {
        let spec = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;
        let url = self.registry.url_for(spec);
        let policy = budget.policy().clone();

        let mut entry = TimelineEntry::new(tool_name, TimelineStatus::Error);
        entry.path = Some(spec.path.clone());
        entry.url = Some(url.clone());
        entry.payload = Some(bound_json(&request, BoundLimits::payload()));

        // Budget gate before the call is charged at all.
        if !budget.can_start_call() {
            warn!(
                tool = tool_name,
                calls_used = budget.calls_used(),
                elapsed_ms = budget.elapsed_ms(),
                "Tool call skipped — turn budget exhausted"
            );
            entry.status = TimelineStatus::BudgetExceeded;
            return Ok(DispatchOutcome {
                result: Err(ToolError::BudgetExhausted {
                    tool_name: tool_name.to_string(),
                }),
                entry,
            });
        }
        budget.charge_call();

        let started = Instant::now();
        let mut retries: u32 = 0;

        loop {
            // Wall-clock gate before each attempt.
            let Some(remaining) = budget.remaining_wall_clock() else {
                warn!(
                    tool = tool_name,
                    retries,
                    "Wall-clock budget exhausted mid-call — abandoning"
                );
                entry.status = TimelineStatus::BudgetExceeded;
                entry.retries = retries;
                entry.latency_ms = started.elapsed().as_millis() as u64;
                return Ok(DispatchOutcome {
                    result: Err(ToolError::BudgetExhausted {
                        tool_name: tool_name.to_string(),
                    }),
                    entry,
                });
            };

            let attempt_timeout = policy.per_call_timeout().min(remaining);
            debug!(tool = tool_name, attempt = retries + 1, "Tool call attempt");

            match tokio::time::timeout(attempt_timeout, self.transport.post(&url, &request)).await
            {
                Ok(Ok(data)) => {
                    entry.status = TimelineStatus::Ok;
                    entry.retries = retries;
                    entry.latency_ms = started.elapsed().as_millis() as u64;
                    entry.result_counts = result_counts(&data);
                    entry.response_keys = response_keys(&data);
                    entry.result_preview = Some(bound_json(&data, BoundLimits::preview()));
                    debug!(
                        tool = tool_name,
                        latency_ms = entry.latency_ms,
                        retries,
                        "Tool call finished"
                    );
                    return Ok(DispatchOutcome {
                        result: Ok(data),
                        entry,
                    });
                }
                // Tool-side rejection below 500: the non-retryable class.
                Ok(Err(TransportError::Rejected { status, body })) if status < 500 => {
                    warn!(tool = tool_name, status, "Tool rejected request — not retrying");
                    let err = ToolError::Rejected {
                        tool_name: tool_name.to_string(),
                        status,
                        reason: body,
                    };
                    entry.status = TimelineStatus::Error;
                    entry.retries = retries;
                    entry.latency_ms = started.elapsed().as_millis() as u64;
                    entry.error = Some(err.to_string());
                    return Ok(DispatchOutcome {
                        result: Err(err),
                        entry,
                    });
                }
                // Network errors and 5xx: the transient class.
                Ok(Err(failure)) => {
                    if retries < policy.max_retries_per_call {
                        retries += 1;
                        self.backoff(&policy.retry_backoff, retries, budget).await;
                        continue;
                    }
                    let err = ToolError::Transport {
                        tool_name: tool_name.to_string(),
                        reason: failure.to_string(),
                    };
                    warn!(tool = tool_name, retries, error = %err, "Tool call failed after retries");
                    entry.status = TimelineStatus::Error;
                    entry.retries = retries;
                    entry.latency_ms = started.elapsed().as_millis() as u64;
                    entry.error = Some(err.to_string());
                    return Ok(DispatchOutcome {
                        result: Err(err),
                        entry,
                    });
                }
                // Per-call timeout: abandoned; a late response is discarded
                // with the dropped future.
                Err(_elapsed) => {
                    if retries < policy.max_retries_per_call {
                        retries += 1;
                        self.backoff(&policy.retry_backoff, retries, budget).await;
                        continue;
                    }
                    let err = ToolError::Timeout {
                        tool_name: tool_name.to_string(),
                        timeout_ms: policy.per_call_timeout_ms,
                    };
                    warn!(tool = tool_name, retries, "Tool call timed out after retries");
                    entry.status = TimelineStatus::Timeout;
                    entry.retries = retries;
                    entry.latency_ms = started.elapsed().as_millis() as u64;
                    entry.error = Some(err.to_string());
                    return Ok(DispatchOutcome {
                        result: Err(err),
                        entry,
                    });
                }
            }
        }
    }

    /// Sleep out the backoff for retry number `retry`, clamped so the sleep
    /// itself cannot blow past the wall-clock deadline.
    async fn backoff(
        &self,
        backoff: &innkeeper_core::RetryBackoff,
        retry: u32,
        budget: &TurnBudget,
    ) {
        use rand::Rng;
        let mut delay = backoff.delay_for(retry);
        if backoff.jitter {
            let cap = (delay.as_millis() as u64) / 4;
            if cap > 0 {
                delay += Duration::from_millis(rand::rng().random_range(0..=cap));
            }
        }
        if let Some(remaining) = budget.remaining_wall_clock() {
            tokio::time::sleep(delay.min(remaining)).await;
        }
    }
}

/// Cardinalities of every top-level array in the response.
fn result_counts(data: &Value) -> Option<BTreeMap<String, usize>> {
    let map = data.as_object()?;
    let counts: BTreeMap<String, usize> = map
        .iter()
        .filter_map(|(k, v)| v.as_array().map(|a| (k.clone(), a.len())))
        .collect();
    if counts.is_empty() {
        None
    } else {
        Some(counts)
    }
}

/// Sorted top-level keys of the response.
fn response_keys(data: &Value) -> Option<Vec<String>> {
    let map = data.as_object()?;
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    Some(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{default_registry, SEARCH_OFFERS};
    use async_trait::async_trait;
    use innkeeper_core::{GuardrailPolicy, RetryBackoff};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> GuardrailPolicy {
        GuardrailPolicy {
            max_tool_calls_per_turn: 8,
            wall_clock_budget_ms: 60_000,
            per_call_timeout_ms: 25,
            max_retries_per_call: max_retries,
            retry_backoff: RetryBackoff {
                base_ms: 1,
                factor: 1.0,
                max_ms: 2,
                jitter: false,
            },
        }
    }

    fn dispatcher(transport: Arc<dyn ToolTransport>) -> Dispatcher {
        Dispatcher::new(
            Arc::new(default_registry("http://localhost:8001")),
            transport,
        )
    }

    /// Responds successfully with a fixed body, counting attempts.
    struct OkTransport {
        attempts: AtomicU32,
        body: Value,
    }

    #[async_trait]
    impl ToolTransport for OkTransport {
        async fn post(&self, _url: &str, _payload: &Value) -> Result<Value, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    /// Accepts the request and never responds.
    struct NeverResponds {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl ToolTransport for NeverResponds {
        async fn post(&self, _url: &str, _payload: &Value) -> Result<Value, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    /// Fails with a network error N times, then succeeds.
    struct FlakyTransport {
        failures: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl ToolTransport for FlakyTransport {
        async fn post(&self, _url: &str, _payload: &Value) -> Result<Value, TransportError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TransportError::Network("connection reset".into()))
            } else {
                Ok(json!({"offers": []}))
            }
        }
    }

    /// Always rejects with the given status.
    struct RejectingTransport {
        status: u16,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl ToolTransport for RejectingTransport {
        async fn post(&self, _url: &str, _payload: &Value) -> Result<Value, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Rejected {
                status: self.status,
                body: "hard_filters: unknown field".into(),
            })
        }
    }

    #[tokio::test]
    async fn ok_call_records_counts_keys_and_preview() {
        let transport = Arc::new(OkTransport {
            attempts: AtomicU32::new(0),
            body: json!({"offers": [{"offer_id": "o1"}, {"offer_id": "o2"}], "result_counts": {"offers": 2}}),
        });
        let d = dispatcher(transport.clone());
        let mut budget = TurnBudget::new(fast_policy(2));

        let outcome = d
            .invoke(SEARCH_OFFERS, json!({"tenant_id": "t"}), &mut budget)
            .await
            .unwrap();

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.entry.status, TimelineStatus::Ok);
        assert_eq!(outcome.entry.retries, 0);
        assert_eq!(
            outcome.entry.result_counts.as_ref().unwrap()["offers"],
            2usize
        );
        assert_eq!(
            outcome.entry.response_keys.as_ref().unwrap(),
            &vec!["offers".to_string(), "result_counts".to_string()]
        );
        assert!(outcome.entry.result_preview.is_some());
        assert_eq!(outcome.entry.path.as_deref(), Some("/tools/search_offers"));
        assert_eq!(budget.calls_used(), 1);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn never_responding_tool_records_timeout_with_exact_retries() {
        let transport = Arc::new(NeverResponds {
            attempts: AtomicU32::new(0),
        });
        let d = dispatcher(transport.clone());
        let mut budget = TurnBudget::new(fast_policy(2));

        let outcome = d
            .invoke(SEARCH_OFFERS, json!({}), &mut budget)
            .await
            .unwrap();

        assert_eq!(outcome.entry.status, TimelineStatus::Timeout);
        // Exactly max_retries_per_call, not more
        assert_eq!(outcome.entry.retries, 2);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
        assert!(matches!(
            outcome.result,
            Err(ToolError::Timeout { timeout_ms: 25, .. })
        ));
        // One timeline entry covering all attempts, not one per attempt
        assert!(outcome.entry.latency_ms >= 75);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_then_succeed() {
        let transport = Arc::new(FlakyTransport {
            failures: 2,
            attempts: AtomicU32::new(0),
        });
        let d = dispatcher(transport.clone());
        let mut budget = TurnBudget::new(fast_policy(2));

        let outcome = d
            .invoke(SEARCH_OFFERS, json!({}), &mut budget)
            .await
            .unwrap();

        assert_eq!(outcome.entry.status, TimelineStatus::Ok);
        assert_eq!(outcome.entry.retries, 2);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejection_fails_immediately_without_retry() {
        let transport = Arc::new(RejectingTransport {
            status: 422,
            attempts: AtomicU32::new(0),
        });
        let d = dispatcher(transport.clone());
        let mut budget = TurnBudget::new(fast_policy(2));

        let outcome = d
            .invoke(SEARCH_OFFERS, json!({}), &mut budget)
            .await
            .unwrap();

        assert_eq!(outcome.entry.status, TimelineStatus::Error);
        assert_eq!(outcome.entry.retries, 0);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(
            outcome.result,
            Err(ToolError::Rejected { status: 422, .. })
        ));
        assert!(outcome.entry.error.is_some());
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let transport = Arc::new(RejectingTransport {
            status: 503,
            attempts: AtomicU32::new(0),
        });
        let d = dispatcher(transport.clone());
        let mut budget = TurnBudget::new(fast_policy(1));

        let outcome = d
            .invoke(SEARCH_OFFERS, json!({}), &mut budget)
            .await
            .unwrap();

        assert_eq!(outcome.entry.status, TimelineStatus::Error);
        assert_eq!(outcome.entry.retries, 1);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);
        assert!(matches!(outcome.result, Err(ToolError::Transport { .. })));
    }

    #[tokio::test]
    async fn call_count_cap_skips_without_attempting() {
        let transport = Arc::new(OkTransport {
            attempts: AtomicU32::new(0),
            body: json!({"offers": []}),
        });
        let d = dispatcher(transport.clone());
        let mut policy = fast_policy(2);
        policy.max_tool_calls_per_turn = 1;
        let mut budget = TurnBudget::new(policy);

        let first = d.invoke(SEARCH_OFFERS, json!({}), &mut budget).await.unwrap();
        assert_eq!(first.entry.status, TimelineStatus::Ok);

        let second = d.invoke(SEARCH_OFFERS, json!({}), &mut budget).await.unwrap();
        assert_eq!(second.entry.status, TimelineStatus::BudgetExceeded);
        assert!(matches!(
            second.result,
            Err(ToolError::BudgetExhausted { .. })
        ));
        // The transport never saw a second request
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(budget.calls_used(), 1);
    }

    #[tokio::test]
    async fn exhausted_wall_clock_skips_without_attempting() {
        let transport = Arc::new(OkTransport {
            attempts: AtomicU32::new(0),
            body: json!({}),
        });
        let d = dispatcher(transport.clone());
        let mut policy = fast_policy(2);
        policy.wall_clock_budget_ms = 0;
        let mut budget = TurnBudget::new(policy);

        let outcome = d.invoke(SEARCH_OFFERS, json!({}), &mut budget).await.unwrap();
        assert_eq!(outcome.entry.status, TimelineStatus::BudgetExceeded);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_fatal_programming_error() {
        let transport = Arc::new(OkTransport {
            attempts: AtomicU32::new(0),
            body: json!({}),
        });
        let d = dispatcher(transport);
        let mut budget = TurnBudget::new(fast_policy(2));

        let err = d
            .invoke("rank_offers", json!({}), &mut budget)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
        // Nothing charged against the budget
        assert_eq!(budget.calls_used(), 0);
    }
}
