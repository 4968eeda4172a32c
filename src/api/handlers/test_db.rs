//! Disposable Postgres for handler integration tests.

use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use test_support::{TestNetwork, postgres::PostgresContainer, runtime};

use crate::api::SCHEMA_SQL;

pub(crate) struct TestDb {
    _postgres: PostgresContainer,
    pub pool: PgPool,
}

impl TestDb {
    /// Start a container and apply the schema; `None` when no container runtime exists.
    pub(crate) async fn start(prefix: &str) -> Result<Option<Self>> {
        if let Err(err) = runtime::ensure_container_runtime() {
            eprintln!("Skipping integration test: {err}");
            return Ok(None);
        }

        let network = TestNetwork::new(prefix);
        let postgres = PostgresContainer::start(network.name()).await?;
        postgres.wait_until_ready().await?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&postgres.admin_dsn())
            .await
            .context("failed to connect test pool")?;
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("failed to apply schema")?;

        Ok(Some(Self {
            _postgres: postgres,
            pool,
        }))
    }
}
