//! Trace correlation for Innkeeper turns.
//!
//! Every turn gets exactly one trace identifier; tool calls within the turn
//! share it (their timeline entries are conceptually sub-spans). The
//! correlator also maintains the snapshot's bounded recent-trace ring and an
//! index from trace id back to the turn that produced it, for external
//! trace-viewer linking.

pub mod correlator;

pub use correlator::{TraceCorrelator, TurnRef, DEFAULT_RING_CAPACITY};
