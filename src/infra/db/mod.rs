//! PostgreSQL adapters for the repository traits.
//!
//! Queries are built at runtime (`query_as` over `FromRow` rows) so the crate
//! compiles without a live database; the schema they expect is the one the
//! bundled installation scripts create.

mod blogs;
mod categories;
mod entries;
mod feedback;
mod tags;
mod util;

pub use util::map_sqlx_error;

use std::{sync::Arc, time::Duration};

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseSettings;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Every content repository, backed by one shared pool.
#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a pool sized from `settings`. Fails when no URL is configured.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, sqlx::Error> {
        let url = settings
            .url
            .as_deref()
            .ok_or_else(|| sqlx::Error::Configuration("database url is not configured".into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.get())
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.pool())
            .await
            .map(|_| ())
    }
}
