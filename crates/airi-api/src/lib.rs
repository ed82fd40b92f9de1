//! AIRI API crate - axum HTTP boundary for the assistant.
//!
//! Exposes the one-shot and streamed protocols, session memory clearing,
//! health and root endpoints, with shared-secret auth, a per-minute rate
//! limit and a whole-request latency header.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
