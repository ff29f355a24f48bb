//! The turn orchestrator.
//!
//! One `run_turn` per incoming chat request: acquire the session lock, load
//! the snapshot, interpret the message, drive guarded tool calls, render the
//! assistant message, append the turn record, and persist with a
//! compare-and-swap. A save conflict is retried once against a freshly
//! loaded snapshot; a second conflict surfaces as a retryable failure.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use innkeeper_core::{
    AgentState, Constraints, Intent, Interpretation, Offer, Reasoner, SessionError, Snapshot,
    SnapshotStore, StoreError, TimelineEntry, TimelineStatus, ToolError, TurnRecord,
    GuardrailPolicy,
};
use innkeeper_telemetry::TraceCorrelator;
use innkeeper_tools::{CHECK_OFFER, Dispatcher, SEARCH_OFFERS, TurnBudget};

use crate::locks::SessionLocks;
use crate::relax::{PriceFirstRelaxation, RelaxationPolicy};
use crate::render;

/// One inbound chat message. The gateway hashes the raw user id before it
/// reaches the engine; the orchestrator never sees it.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: Option<Uuid>,
    pub user_id_hash: String,
    pub message: String,
}

/// Guardrail usage for one completed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailReport {
    pub tool_calls_used: u32,
    pub wall_clock_ms: u64,
}

/// The turn-completion result handed to the chat surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub session_id: Uuid,
    pub trace_id: String,
    pub agent_state: AgentState,
    pub assistant_message: String,
    pub recommended_offers: Vec<Offer>,
    pub tool_timeline: Vec<TimelineEntry>,
    pub guardrails: GuardrailReport,
}

/// The session state machine driver.
pub struct SessionEngine {
    store: Arc<dyn SnapshotStore>,
    reasoner: Arc<dyn Reasoner>,
    dispatcher: Arc<Dispatcher>,
    correlator: Arc<TraceCorrelator>,
    policy: GuardrailPolicy,
    tenant_id: String,
    relaxation: Arc<dyn RelaxationPolicy>,
    locks: SessionLocks,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        reasoner: Arc<dyn Reasoner>,
        dispatcher: Arc<Dispatcher>,
        correlator: Arc<TraceCorrelator>,
        policy: GuardrailPolicy,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            reasoner,
            dispatcher,
            correlator,
            policy,
            tenant_id: tenant_id.into(),
            relaxation: Arc::new(PriceFirstRelaxation),
            locks: SessionLocks::new(),
        }
    }

    /// Override the zero-result relaxation policy.
    pub fn with_relaxation(mut self, relaxation: Arc<dyn RelaxationPolicy>) -> Self {
        self.relaxation = relaxation;
        self
    }

    /// Run one conversational turn to completion.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnResult, SessionError> {
        let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);

        // Single writer per session for the duration of the turn.
        let _guard = self.locks.acquire(session_id).await;

        let mut conflict_retried = false;
        loop {
            let loaded = self.store.load(session_id).await?;
            let expected = loaded.as_ref().map(|s| s.updated_at);
            let mut snapshot = loaded.unwrap_or_else(|| {
                info!(session_id = %session_id, "New session");
                Snapshot::new(session_id, &self.tenant_id, &request.user_id_hash)
            });

            let trace_id = self.correlator.new_trace_id();
            let mut budget = TurnBudget::new(self.policy.clone());
            let mut timeline: Vec<TimelineEntry> = Vec::new();

            let assistant_message = self
                .execute_turn(&mut snapshot, &request.message, &mut budget, &mut timeline)
                .await?;

            let turn_index = snapshot.turns.len();
            let record = TurnRecord {
                ts: Utc::now(),
                trace_id: trace_id.clone(),
                user_message: request.message.clone(),
                assistant_message: assistant_message.clone(),
                agent_state: snapshot.agent_state,
                tool_timeline: timeline.clone(),
                recommended_offers: snapshot.recommended_offers.clone(),
            };
            snapshot.push_turn(record);
            self.correlator
                .push_recent(&mut snapshot.recent_trace_ids, trace_id.clone());
            snapshot.touch();

            match self.store.save(&snapshot, expected).await {
                Ok(()) => {
                    self.correlator
                        .record_turn(trace_id.clone(), session_id, turn_index);
                    info!(
                        session_id = %session_id,
                        trace_id = %trace_id,
                        agent_state = %snapshot.agent_state,
                        tool_calls = budget.calls_used(),
                        elapsed_ms = budget.elapsed_ms(),
                        "Turn completed"
                    );
                    return Ok(TurnResult {
                        session_id,
                        trace_id,
                        agent_state: snapshot.agent_state,
                        assistant_message,
                        recommended_offers: snapshot.recommended_offers,
                        tool_timeline: timeline,
                        guardrails: GuardrailReport {
                            tool_calls_used: budget.calls_used(),
                            wall_clock_ms: budget.elapsed_ms(),
                        },
                    });
                }
                Err(StoreError::Conflict { .. }) if !conflict_retried => {
                    warn!(session_id = %session_id, "Snapshot moved underneath the turn — retrying once");
                    conflict_retried = true;
                    continue;
                }
                Err(StoreError::Conflict { .. }) => {
                    return Err(SessionError::TurnConflict { session_id });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Drive one turn against a loaded snapshot. Returns the assistant
    /// message; the snapshot and timeline are mutated in place.
    async fn execute_turn(
        &self,
        snapshot: &mut Snapshot,
        message: &str,
        budget: &mut TurnBudget,
        timeline: &mut Vec<TimelineEntry>,
    ) -> Result<String, SessionError> {
        // Terminal sessions stay readable but never issue tool calls again.
        if snapshot.agent_state.is_terminal() {
            return Ok(render::session_closed(snapshot.agent_state));
        }

        let interpretation = self
            .reasoner
            .interpret(message, &snapshot.constraints)
            .await?;
        debug!(intent = ?interpretation.intent, "Message interpreted");

        match interpretation.intent {
            Intent::Cancel => {
                snapshot.constraints = Constraints::default();
                snapshot.recommended_offers.clear();
                snapshot.offers_fingerprint = None;
                self.transition(snapshot, AgentState::Cancelled);
                Ok(render::cancelled())
            }
            Intent::SelectOffer => {
                self.handle_selection(snapshot, &interpretation, budget, timeline)
                    .await
            }
            Intent::ProvideInfo | Intent::Other => {
                self.handle_refinement(snapshot, &interpretation, budget, timeline)
                    .await
            }
        }
    }

    /// Apply the constraint delta and either clarify, re-present, or search.
    async fn handle_refinement(
        &self,
        snapshot: &mut Snapshot,
        interpretation: &Interpretation,
        budget: &mut TurnBudget,
        timeline: &mut Vec<TimelineEntry>,
    ) -> Result<String, SessionError> {
        if interpretation.delta.reset {
            info!("Explicit reset — clearing constraints");
            snapshot.recommended_offers.clear();
            snapshot.offers_fingerprint = None;
            self.transition(snapshot, AgentState::Init);
        }
        snapshot.constraints.apply(&interpretation.delta);

        let missing = snapshot.constraints.missing_required_fields();
        if !missing.is_empty() {
            self.transition(snapshot, AgentState::CollectingConstraints);
            return Ok(render::clarify(&missing, &snapshot.constraints));
        }

        // Constraints are complete. Decide whether the cached offers are
        // still valid for them.
        let fingerprint = snapshot.constraints.fingerprint();
        let cache_valid = snapshot.offers_fingerprint.as_deref() == Some(fingerprint.as_str())
            && !snapshot.recommended_offers.is_empty();

        if cache_valid
            && matches!(
                snapshot.agent_state,
                AgentState::WaitForSelection | AgentState::Confirming
            )
        {
            // Nothing tool-relevant changed; re-present what we have.
            self.transition(snapshot, AgentState::WaitForSelection);
            return Ok(render::offers(
                &snapshot.constraints,
                &snapshot.recommended_offers,
            ));
        }

        if !snapshot.recommended_offers.is_empty() {
            info!("Constraints changed — cached offers invalidated");
            snapshot.recommended_offers.clear();
            snapshot.offers_fingerprint = None;
        }
        if snapshot.agent_state == AgentState::Init {
            self.transition(snapshot, AgentState::CollectingConstraints);
        }
        if snapshot.agent_state == AgentState::Confirming {
            self.transition(snapshot, AgentState::WaitForSelection);
        }

        self.run_search(snapshot, fingerprint, budget, timeline).await
    }

    /// Invoke the search tool and advance the state machine on its outcome.
    async fn run_search(
        &self,
        snapshot: &mut Snapshot,
        fingerprint: String,
        budget: &mut TurnBudget,
        timeline: &mut Vec<TimelineEntry>,
    ) -> Result<String, SessionError> {
        self.transition(snapshot, AgentState::Searching);

        let payload = snapshot.constraints.search_payload(&self.tenant_id);
        let outcome = self.dispatcher.invoke(SEARCH_OFFERS, payload, budget).await?;
        let status = outcome.entry.status;
        timeline.push(outcome.entry);

        match outcome.result {
            Ok(data) => {
                let now = Utc::now();
                // Spot-check on the client side: never present an expired,
                // unavailable, or hard-filter-violating offer as selectable.
                let verified: Vec<Offer> = parse_offers(&data)
                    .into_iter()
                    .filter(|o| o.is_selectable(now) && !o.violates_hard_filters(&snapshot.constraints))
                    .collect();

                if verified.is_empty() {
                    self.transition(snapshot, AgentState::CollectingConstraints);
                    let suggestion = self.relaxation.suggest(&snapshot.constraints);
                    return Ok(render::no_results(&snapshot.constraints, suggestion));
                }

                snapshot.recommended_offers = verified;
                snapshot.offers_fingerprint = Some(fingerprint);
                self.transition(snapshot, AgentState::WaitForSelection);
                Ok(render::offers(
                    &snapshot.constraints,
                    &snapshot.recommended_offers,
                ))
            }
            Err(_) => {
                // No offers to advance to; the turn degrades and the session
                // keeps collecting. The message reflects the actual outcome.
                self.transition(snapshot, AgentState::CollectingConstraints);
                Ok(match status {
                    TimelineStatus::BudgetExceeded => render::budget_exhausted("search"),
                    TimelineStatus::Timeout => render::step_failed("search", "timed out"),
                    _ => render::step_failed("search", "failed"),
                })
            }
        }
    }

    /// Resolve a selection, re-verify it, and confirm or fall back.
    async fn handle_selection(
        &self,
        snapshot: &mut Snapshot,
        interpretation: &Interpretation,
        budget: &mut TurnBudget,
        timeline: &mut Vec<TimelineEntry>,
    ) -> Result<String, SessionError> {
        if !matches!(
            snapshot.agent_state,
            AgentState::WaitForSelection | AgentState::Confirming
        ) {
            return Ok(render::nothing_to_select());
        }

        // Exact offer_id always takes precedence over fuzzy matching.
        let selected: Offer = if let Some(offer_id) = &interpretation.selected_offer_id {
            match snapshot
                .recommended_offers
                .iter()
                .find(|o| &o.offer_id == offer_id)
            {
                Some(offer) => offer.clone(),
                None => {
                    self.transition(snapshot, AgentState::WaitForSelection);
                    return Ok(render::offer_not_found(offer_id));
                }
            }
        } else {
            let matches = fuzzy_matches(
                interpretation.selection_hint.as_deref().unwrap_or(""),
                &snapshot.recommended_offers,
            );
            match matches.len() {
                1 => matches.into_iter().next().unwrap(),
                // The machine must not guess.
                0 => return Ok(render::ask_for_offer_id()),
                _ => return Ok(render::disambiguate(&matches)),
            }
        };

        self.transition(snapshot, AgentState::Confirming);
        let payload = json!({
            "tenant_id": self.tenant_id,
            "offer_id": selected.offer_id,
        });
        let outcome = self.dispatcher.invoke(CHECK_OFFER, payload, budget).await?;
        let status = outcome.entry.status;
        timeline.push(outcome.entry);

        match outcome.result {
            Ok(data) => {
                let Some(rechecked) = parse_rechecked(&data) else {
                    warn!(offer_id = %selected.offer_id, "Re-check response unparseable");
                    self.transition(snapshot, AgentState::WaitForSelection);
                    return Ok(render::step_failed("re-check", "returned malformed data"));
                };
                let now = Utc::now();

                if rechecked.is_selectable(now) && selected.price_unchanged(&rechecked) {
                    self.transition(snapshot, AgentState::Confirmed);
                    info!(offer_id = %rechecked.offer_id, "Offer confirmed at verified price");
                    return Ok(render::confirmed(&rechecked, &snapshot.constraints));
                }

                // Staleness path: never confirm; drop or refresh the entry.
                self.transition(snapshot, AgentState::WaitForSelection);
                if !rechecked.is_selectable(now) {
                    snapshot
                        .recommended_offers
                        .retain(|o| o.offer_id != selected.offer_id);
                    Ok(render::selection_gone(&selected, &snapshot.recommended_offers))
                } else {
                    for offer in snapshot.recommended_offers.iter_mut() {
                        if offer.offer_id == selected.offer_id {
                            *offer = rechecked.clone();
                        }
                    }
                    Ok(render::price_changed(&selected, &rechecked))
                }
            }
            Err(error) => match status {
                // Guardrail tripped before the re-check ran: degrade, the
                // user can re-select next turn.
                TimelineStatus::BudgetExceeded => {
                    self.transition(snapshot, AgentState::WaitForSelection);
                    Ok(render::budget_exhausted("re-check"))
                }
                // Tool-side rejection: turn ends in the pre-call state.
                _ if matches!(error, ToolError::Rejected { .. }) => {
                    self.transition(snapshot, AgentState::WaitForSelection);
                    Ok(render::step_failed("re-check", "was rejected by the pricing tool"))
                }
                // Transient class exhausted its retries: unrecoverable.
                _ => {
                    self.transition(snapshot, AgentState::Failed);
                    Ok(render::recheck_failed())
                }
            },
        }
    }

    fn transition(&self, snapshot: &mut Snapshot, next: AgentState) {
        debug_assert!(
            snapshot.agent_state.can_transition_to(next),
            "invalid transition {} -> {next}",
            snapshot.agent_state
        );
        if snapshot.agent_state != next {
            debug!(from = %snapshot.agent_state, to = %next, "State transition");
            snapshot.agent_state = next;
        }
    }
}

/// Offers from a search response, skipping records that do not parse.
fn parse_offers(data: &Value) -> Vec<Offer> {
    let Some(items) = data.get("offers").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(offer) => Some(offer),
            Err(e) => {
                warn!(error = %e, "Skipping malformed offer record");
                None
            }
        })
        .collect()
}

/// The re-verified offer from a check response (either bare or under
/// an "offer" key).
fn parse_rechecked(data: &Value) -> Option<Offer> {
    let obj = match data.get("offer") {
        Some(inner) if inner.is_object() => inner,
        _ => data,
    };
    serde_json::from_value(obj.clone()).ok()
}

/// Case-insensitive hotel-name matching for fuzzy selection phrases.
fn fuzzy_matches(hint: &str, offers: &[Offer]) -> Vec<Offer> {
    let hint = hint.trim().to_lowercase();
    if hint.is_empty() {
        return Vec::new();
    }
    offers
        .iter()
        .filter(|o| {
            o.hotel_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&hint))
        })
        .cloned()
        .collect()
}
