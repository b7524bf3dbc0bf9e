//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the database pool, the blob backend, the loaded configuration, and
//! the client-code rate limiter. Nothing about boards is cached in memory:
//! Postgres is the source of truth and every request reads through to it.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::rate_limit::RateLimiter;
use crate::services::blob::BlobStore;

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub blobs: Arc<dyn BlobStore>,
    pub config: Arc<AppConfig>,
    /// Per-address limiter for `POST /api/client/verify`.
    pub verify_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, blobs: Arc<dyn BlobStore>, config: AppConfig) -> Self {
        let verify_limiter = RateLimiter::new(config.verify_limit, config.verify_window);
        Self { pool, blobs, config: Arc::new(config), verify_limiter }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
