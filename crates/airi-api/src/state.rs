//! Application state shared across all route handlers.
//!
//! Built once at startup from the loaded configuration and passed to
//! handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use airi_assistant::Assistant;
use airi_core::config::ServerConfig;
use airi_core::AiriConfig;

use crate::rate_limit::RateLimiter;

/// Shared application state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Request orchestrator.
    pub assistant: Assistant,
    /// Listener, CORS and auth settings.
    pub server: Arc<ServerConfig>,
    pub app_name: String,
    pub llm_provider: String,
    pub llm_model: String,
    /// Fixed-window limiter shared by the API routes.
    pub limiter: RateLimiter,
    /// Server start time for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &AiriConfig, assistant: Assistant) -> Self {
        Self {
            assistant,
            server: Arc::new(config.server.clone()),
            app_name: config.general.app_name.clone(),
            llm_provider: config.llm.provider.as_str().to_string(),
            llm_model: config.llm.model().to_string(),
            limiter: RateLimiter::new(config.server.rate_limit_per_minute),
            start_time: Instant::now(),
        }
    }
}
