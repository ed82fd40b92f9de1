//! Language model fallback for the AIRI assistant.
//!
//! Builds a bounded prompt, calls an OpenAI-compatible completion endpoint
//! and repairs whatever comes back into a [`airi_core::StructuredResponse`].

pub mod backend;
pub mod client;
pub mod error;
pub mod parser;
pub mod prompt;

pub use backend::{CompletionBackend, CompletionRequest, OpenAiCompatibleBackend};
pub use client::{LlmClient, LlmSettings};
pub use error::LlmError;
pub use prompt::{ChatMessage, SYSTEM_PROMPT};
