//! AIRI orchestrator.
//!
//! Composes the rule router, session memory and LLM client into the two
//! delivery protocols: a one-shot [`Assistant::process`] and a paced event
//! stream from [`Assistant::stream`].

pub mod assistant;
pub mod events;

pub use assistant::Assistant;
pub use events::{word_tokens, StreamEvent};
