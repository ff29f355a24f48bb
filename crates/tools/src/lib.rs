//! Tool registry and the guarded dispatcher.
//!
//! The registry is a static mapping from tool name to endpoint; the
//! dispatcher issues single invocations under the per-turn guardrail budget,
//! owning retry/timeout/backoff logic and timeline recording. The transport
//! is a trait so tests can inject fault behavior without a network.

pub mod bound;
pub mod budget;
pub mod dispatcher;
pub mod registry;
pub mod transport;

pub use bound::{bound_json, BoundLimits};
pub use budget::TurnBudget;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use registry::{default_registry, ToolRegistry, ToolSpec, CHECK_OFFER, SEARCH_OFFERS};
pub use transport::{HttpTransport, ToolTransport, TransportError};
