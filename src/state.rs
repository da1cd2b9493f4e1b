//! Application state management
//!
//! Explicitly constructed, dependency-injected clients shared by the worker
//! fleet and the service layer. No global connections; every consumer gets
//! its handles from here.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{catalog::ExerciseCatalog, config::Config, queue::QueueClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (wrapped in Arc for cheap cloning)
struct AppStateInner {
    /// Database connection pool
    db: PgPool,

    /// Job queue client
    queue: QueueClient,

    /// Exercise catalog reader
    catalog: ExerciseCatalog,

    /// Application configuration
    config: Config,
}

impl AppState {
    /// Create a new application state
    pub fn new(db: PgPool, queue: QueueClient, catalog: ExerciseCatalog, config: Config) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                db,
                queue,
                catalog,
                config,
            }),
        }
    }

    /// Get a reference to the database pool
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get a reference to the queue client
    pub fn queue(&self) -> &QueueClient {
        &self.inner.queue
    }

    /// Get a reference to the exercise catalog
    pub fn catalog(&self) -> &ExerciseCatalog {
        &self.inner.catalog
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
