//! Fixed-window rate limiter middleware.
//!
//! Limits requests to a configurable number per minute using an atomic
//! counter that resets at each minute boundary. Applied as an axum
//! middleware.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;

const WINDOW_SECS: u64 = 60;

/// Shared state for the rate limiter.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    /// Maximum requests per window; 0 disables limiting.
    max_per_window: u64,
    /// Current count of requests in the active window.
    count: Arc<AtomicU64>,
    /// Index of the current window (epoch seconds / 60).
    window: Arc<AtomicU64>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_window: u64::from(max_per_minute),
            count: Arc::new(AtomicU64::new(0)),
            window: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_per_window > 0
    }

    /// Take a permit, or return the seconds until the window resets.
    pub fn try_acquire(&self) -> Result<(), u64> {
        if !self.is_enabled() {
            return Ok(());
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.acquire_at(now)
    }

    fn acquire_at(&self, now_secs: u64) -> Result<(), u64> {
        let window = now_secs / WINDOW_SECS;
        if self.window.swap(window, Ordering::Relaxed) != window {
            self.count.store(1, Ordering::Relaxed);
            return Ok(());
        }

        let prev = self.count.fetch_add(1, Ordering::Relaxed);
        if prev < self.max_per_window {
            Ok(())
        } else {
            Err(WINDOW_SECS - now_secs % WINDOW_SECS)
        }
    }
}

/// Axum middleware that enforces the rate limit.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    match limiter.try_acquire() {
        Ok(()) => next.run(req).await,
        Err(retry_after_secs) => {
            tracing::debug!(retry_after_secs, "Rate limit exceeded");
            ApiError::RateLimited { retry_after_secs }.into_response()
        }
    }
}
