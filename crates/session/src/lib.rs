//! The session state machine and turn orchestrator.
//!
//! One [`engine::SessionEngine`] invocation per incoming chat request: load
//! the snapshot, interpret the message, drive zero or more guarded tool
//! calls, render the assistant message, persist the updated snapshot.
//! Two turns for the same session never execute concurrently — an in-process
//! per-session lock serializes them, and the store-level compare-and-swap
//! catches what the lock cannot once multiple orchestrator instances run.

pub mod engine;
pub mod locks;
pub mod relax;
pub mod render;

pub use engine::{GuardrailReport, SessionEngine, TurnRequest, TurnResult};
pub use locks::SessionLocks;
pub use relax::{PriceFirstRelaxation, RelaxationPolicy};
