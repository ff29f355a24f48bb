//! Trace identifier generation, the recent-trace ring, and the turn index.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Default capacity of a snapshot's recent-trace ring buffer.
pub const DEFAULT_RING_CAPACITY: usize = 10;

/// The turn a trace id resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRef {
    pub session_id: Uuid,
    /// Index into the session's append-only `turns` sequence.
    pub turn_index: usize,
}

/// Assigns one trace identifier per turn and exposes the reverse mapping.
///
/// The index is in-process state; it is rebuilt naturally as turns run and
/// is intentionally not persisted (snapshots carry the ring instead).
pub struct TraceCorrelator {
    ring_capacity: usize,
    index: RwLock<HashMap<String, TurnRef>>,
}

impl TraceCorrelator {
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            ring_capacity: ring_capacity.max(1),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// A fresh 32-hex trace identifier.
    pub fn new_trace_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Push a trace id onto a snapshot's ring, evicting the oldest entries
    /// once capacity is reached (FIFO).
    pub fn push_recent(&self, ring: &mut Vec<String>, trace_id: impl Into<String>) {
        ring.push(trace_id.into());
        while ring.len() > self.ring_capacity {
            ring.remove(0);
        }
    }

    /// Record which turn a trace id belongs to.
    pub fn record_turn(&self, trace_id: impl Into<String>, session_id: Uuid, turn_index: usize) {
        let trace_id = trace_id.into();
        debug!(trace_id = %trace_id, session_id = %session_id, turn_index, "Trace recorded");
        self.index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                trace_id,
                TurnRef {
                    session_id,
                    turn_index,
                },
            );
    }

    /// Resolve a trace id to its turn, for trace-viewer linking.
    pub fn lookup(&self, trace_id: &str) -> Option<TurnRef> {
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(trace_id)
            .copied()
    }
}

impl Default for TraceCorrelator {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}
