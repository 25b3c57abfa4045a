//! Shared PostgreSQL connection plumbing.
//!
//! Both the database extractor and the loaders go through a small
//! deadpool-postgres pool built from the `POSTGRES_DSN` connection string.

use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Connection timeout for new PostgreSQL connections.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a connection pool from a DSN string and verify connectivity.
pub async fn connect_pool(dsn: &str, max_size: usize) -> Result<Pool> {
    let mut pg_config: PgConfig = dsn
        .parse()
        .map_err(|e| PipelineError::Config(format!("invalid POSTGRES_DSN: {}", e)))?;
    pg_config.connect_timeout(CONNECT_TIMEOUT);

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
    let pool = Pool::builder(mgr)
        .max_size(max_size)
        .build()
        .map_err(|e| PipelineError::pool(e, "creating PostgreSQL pool"))?;

    // Test connection
    let client = pool
        .get()
        .await
        .map_err(|e| PipelineError::pool(e, "testing PostgreSQL connection"))?;
    client.simple_query("SELECT 1").await?;
    debug!("Connected to PostgreSQL");

    Ok(pool)
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
