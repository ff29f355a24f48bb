//! Implementations of the external reasoning capability.
//!
//! The orchestrator consumes reasoning through the narrow
//! [`innkeeper_core::Reasoner`] contract. This crate provides the production
//! OpenAI-compatible HTTP interpreter and a deterministic scripted stub for
//! tests and offline demos. The contract is total: unparseable input
//! degrades to an `other` intent with an empty delta, never an unstructured
//! failure.

pub mod extract;
pub mod openai_compat;
pub mod prompt;
pub mod scripted;

pub use extract::extract_first_json_object;
pub use openai_compat::OpenAiCompatReasoner;
pub use scripted::ScriptedReasoner;
