//! Storage bootstrap, dialect abstraction and schema evolution.
//!
//! # Responsibility
//! - Open and configure connections for both supported backends.
//! - Keep dialect divergence (placeholders, upsert phrasing, type names)
//!   behind one statement-builder interface.
//! - Apply idempotent schema migrations and maintain the embedded backup.
//!
//! # Invariants
//! - Repository code never branches on the active dialect.
//! - Core code must not read/write application data before
//!   `schema::ensure_schema` has run for the deployment.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod backup;
pub mod conn;
pub mod dialect;
pub mod schema;
pub mod value;

pub type StoreResult<T> = Result<T, StoreError>;

/// Transport-level storage failure from either backend.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Postgres(postgres::Error),
    Pool(r2d2::Error),
    Decode(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Postgres(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "connection pool: {err}"),
            Self::Decode(message) => write!(f, "row decode: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Postgres(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::Decode(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<postgres::Error> for StoreError {
    fn from(value: postgres::Error) -> Self {
        Self::Postgres(value)
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}
