//! # Innkeeper Core
//!
//! Domain types, traits, and error definitions for the Innkeeper booking
//! orchestrator. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with deterministic stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod constraints;
pub mod error;
pub mod guardrail;
pub mod offer;
pub mod reasoner;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod timeline;

// Re-export key types at crate root for ergonomics
pub use constraints::{Constraints, ConstraintDelta, Occupancy, RequiredField};
pub use error::{Error, Result, ReasonerError, SessionError, StoreError, ToolError};
pub use guardrail::{GuardrailPolicy, RetryBackoff};
pub use offer::{InventoryStatus, Offer};
pub use reasoner::{Intent, Interpretation, Reasoner};
pub use snapshot::{SessionSummary, Snapshot, SnapshotBody, SnapshotImport, TurnRecord};
pub use state::AgentState;
pub use store::SnapshotStore;
pub use timeline::{TimelineEntry, TimelineStatus};
