//! Pooled Postgres session.
//!
//! Wraps a SQLx `PgPool`. The pool is built lazily, so constructing a session
//! never contacts the server; the first query does.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{debug, info, trace, warn};

use super::types::{PgValueConverter, QueryParam, RowMap};
use crate::logging::redact_url;

/// Environment variable holding the default connection URL.
pub const PG_CONN_URL_ENV: &str = "PG_CONN_URL";

const CONNECTIVITY_TABLE: &str = "connectivity_check";

/// Pool and row settings for a [`SqlSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Whether [`RowMap::get`] falls back to ASCII case-insensitive lookup.
    pub case_insensitive: bool,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// A Postgres session backed by a connection pool.
pub struct SqlSession {
    pool: PgPool,
    options: SessionOptions,
    display_url: String,
}

impl std::fmt::Debug for SqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSession")
            .field("url", &self.display_url)
            .field("options", &self.options)
            .field("pool", &"<PgPool>")
            .finish()
    }
}

impl SqlSession {
    /// Configure a session for `url`. Must be called inside a tokio runtime.
    pub fn connect(url: &str, options: SessionOptions) -> Result<Self> {
        let display_url = redact_url(url);
        let connect_options = PgConnectOptions::from_str(url)
            .with_context(|| format!("Invalid connection URL {display_url}"))?;

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_lazy_with(connect_options);

        info!(url = %display_url, "SQL session configured");

        Ok(Self {
            pool,
            options,
            display_url,
        })
    }

    /// Configure a session from `PG_CONN_URL` with default options.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(PG_CONN_URL_ENV)
            .map_err(|_| anyhow!("{PG_CONN_URL_ENV} is not set"))?;
        Self::connect(&url, SessionOptions::default())
    }

    /// Run one statement in its own transaction and return every row.
    ///
    /// Commits on success. Any failure rolls the transaction back before the
    /// error is returned; the connection goes back to the pool either way.
    pub async fn run_query(&self, sql: &str, params: &[QueryParam]) -> Result<Vec<RowMap>> {
        trace!(sql = %sql, params = params.len(), "Running query");

        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| format!("Failed to open transaction on {}", self.display_url))?;

        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, param| param.bind(query));

        match query.fetch_all(&mut *tx).await {
            Ok(rows) => {
                tx.commit().await.context("Failed to commit transaction")?;
                debug!(rows = rows.len(), "Query completed");
                Ok(rows
                    .iter()
                    .map(|row| PgValueConverter::row_map(row, self.options.case_insensitive))
                    .collect())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                warn!(error = %err, "Query failed, transaction rolled back");
                Err(anyhow!(err).context("Query failed"))
            }
        }
    }

    /// Create a scratch table if needed and read from it.
    pub async fn test_connectivity(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .with_context(|| format!("Failed to connect to {}", self.display_url))?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {CONNECTIVITY_TABLE} (id INTEGER PRIMARY KEY, name VARCHAR)"
        ))
        .execute(&mut *conn)
        .await?;

        sqlx::query(&format!("SELECT * FROM {CONNECTIVITY_TABLE} LIMIT 1"))
            .fetch_optional(&mut *conn)
            .await?;

        info!(url = %self.display_url, "Database connectivity verified");
        Ok(())
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
