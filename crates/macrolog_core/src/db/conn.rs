//! Connection bootstrap for both backend dialects.
//!
//! # Responsibility
//! - Open embedded SQLite connections with the session pragmas the
//!   single-writer deployment relies on.
//! - Hold the process-wide pool for the networked backend.
//! - Expose one `StoreConnection` handle the repository drives regardless
//!   of dialect.
//!
//! # Invariants
//! - Embedded connections are short-lived: one per request, WAL provides
//!   overlapping readers with a single committing writer.
//! - `open` never applies migrations; `schema::ensure_schema` runs once at
//!   process start.

use super::dialect::SqlDialect;
use super::value::{from_pg_row, pg_params, RowValues, SqlValue};
use super::{StoreError, StoreResult};
use crate::config::{BackendConfig, StoreConfig};
use log::{debug, error};
use postgres::NoTls;
use r2d2_postgres::PostgresConnectionManager;
use rusqlite::params_from_iter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const POOL_MAX_SIZE: u32 = 10;

const SQLITE_SESSION_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;";

/// Opens dialect-appropriate connections for the configured backend.
pub struct ConnectionProvider {
    inner: ProviderInner,
}

enum ProviderInner {
    Embedded {
        db_path: PathBuf,
    },
    Networked {
        pool: r2d2::Pool<PostgresConnectionManager<NoTls>>,
    },
}

impl ConnectionProvider {
    /// Builds a provider for the configured backend.
    ///
    /// For the networked backend this constructs the process-wide pool, so
    /// connectivity failures surface here rather than on first request.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let inner = match &config.backend {
            BackendConfig::Embedded { db_path, .. } => ProviderInner::Embedded {
                db_path: db_path.clone(),
            },
            BackendConfig::Networked { url } => {
                let manager = PostgresConnectionManager::new(
                    url.parse().map_err(StoreError::Postgres)?,
                    NoTls,
                );
                let pool = r2d2::Pool::builder()
                    .max_size(POOL_MAX_SIZE)
                    .build(manager)?;
                ProviderInner::Networked { pool }
            }
        };
        Ok(Self { inner })
    }

    pub fn dialect(&self) -> SqlDialect {
        match &self.inner {
            ProviderInner::Embedded { .. } => SqlDialect::Sqlite,
            ProviderInner::Networked { .. } => SqlDialect::Postgres,
        }
    }

    /// Opens one short-lived connection to the active backend.
    pub fn open(&self) -> StoreResult<StoreConnection> {
        let started_at = Instant::now();
        let opened = match &self.inner {
            ProviderInner::Embedded { db_path } => {
                open_sqlite(db_path).map(StoreConnection::Sqlite)
            }
            ProviderInner::Networked { pool } => pool
                .get()
                .map(StoreConnection::Postgres)
                .map_err(StoreError::from),
        };

        match opened {
            Ok(conn) => {
                debug!(
                    "event=db_open module=db status=ok dialect={:?} duration_ms={}",
                    self.dialect(),
                    started_at.elapsed().as_millis()
                );
                Ok(conn)
            }
            Err(err) => {
                error!(
                    "event=db_open module=db status=error dialect={:?} duration_ms={} error={}",
                    self.dialect(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn open_sqlite(db_path: &Path) -> StoreResult<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(SQLITE_SESSION_PRAGMAS)?;
    Ok(conn)
}

/// Live connection to the active backend.
pub enum StoreConnection {
    Sqlite(rusqlite::Connection),
    Postgres(r2d2::PooledConnection<PostgresConnectionManager<NoTls>>),
}

impl StoreConnection {
    pub fn dialect(&self) -> SqlDialect {
        match self {
            Self::Sqlite(_) => SqlDialect::Sqlite,
            Self::Postgres(_) => SqlDialect::Postgres,
        }
    }

    /// The raw embedded connection, when this handle is embedded.
    ///
    /// Used by the backup manager, which is embedded-only by contract.
    pub fn sqlite(&self) -> Option<&rusqlite::Connection> {
        match self {
            Self::Sqlite(conn) => Some(conn),
            Self::Postgres(_) => None,
        }
    }

    /// Runs one mutating statement, returning the affected row count.
    pub fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<u64> {
        match self {
            Self::Sqlite(conn) => {
                let changed = conn.execute(sql, params_from_iter(params.iter()))?;
                Ok(changed as u64)
            }
            Self::Postgres(client) => {
                let bound = pg_params(params);
                Ok(client.execute(sql, &bound)?)
            }
        }
    }

    /// Runs one query, decoding every row into owned dialect-neutral values.
    pub fn query(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<RowValues>> {
        match self {
            Self::Sqlite(conn) => {
                let mut stmt = conn.prepare(sql)?;
                let column_count = stmt.column_count();
                let mut rows = stmt.query(params_from_iter(params.iter()))?;
                let mut decoded = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(column_count);
                    for idx in 0..column_count {
                        let raw: rusqlite::types::Value = row.get(idx)?;
                        values.push(SqlValue::from_sqlite(raw)?);
                    }
                    decoded.push(RowValues(values));
                }
                Ok(decoded)
            }
            Self::Postgres(client) => {
                let bound = pg_params(params);
                let rows = client.query(sql, &bound)?;
                rows.iter().map(from_pg_row).collect()
            }
        }
    }

    /// Runs one query expected to yield at most one row.
    pub fn query_one(&mut self, sql: &str, params: &[SqlValue]) -> StoreResult<Option<RowValues>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Runs a parameter-free statement batch outside any transaction.
    pub fn batch(&mut self, sql: &str) -> StoreResult<()> {
        match self {
            Self::Sqlite(conn) => Ok(conn.execute_batch(sql)?),
            Self::Postgres(client) => Ok(client.batch_execute(sql)?),
        }
    }

    /// Runs a parameter-free statement batch inside a single transaction.
    ///
    /// On failure the transaction is rolled back before the error returns,
    /// so a crashed migration leaves either the old or the new state.
    pub fn batch_in_transaction(&mut self, body: &str) -> StoreResult<()> {
        let wrapped = match self {
            Self::Sqlite(_) => format!("BEGIN IMMEDIATE;\n{body}\nCOMMIT;"),
            Self::Postgres(_) => format!("BEGIN;\n{body}\nCOMMIT;"),
        };
        if let Err(err) = self.batch(&wrapped) {
            let _ = self.batch("ROLLBACK;");
            return Err(err);
        }
        Ok(())
    }
}
