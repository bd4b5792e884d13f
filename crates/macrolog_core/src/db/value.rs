//! Dialect-neutral parameter and row values.
//!
//! # Responsibility
//! - Carry bind parameters in a form both backends can consume.
//! - Carry query results as owned rows with typed accessors.
//!
//! # Invariants
//! - Null parameters stay typed: the networked backend type-checks NULL
//!   binds against the statement's inferred parameter type.
//! - Accessors accept a null of any variant; a non-null variant mismatch is
//!   a decode error, never a silent coercion (integer widening to float is
//!   the one exception, for rows that predate the float columns).

use super::StoreError;
use postgres::types::{ToSql as PgToSql, Type};
use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};

/// One bind parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Real(Option<f64>),
    Integer(Option<i64>),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(Some(value.into()))
    }

    pub fn opt_text(value: Option<impl Into<String>>) -> Self {
        Self::Text(value.map(Into::into))
    }

    pub fn real(value: f64) -> Self {
        Self::Real(Some(value))
    }

    pub fn opt_real(value: Option<f64>) -> Self {
        Self::Real(value)
    }

    pub fn integer(value: i64) -> Self {
        Self::Integer(Some(value))
    }

    fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Text(None) | Self::Real(None) | Self::Integer(None)
        )
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Real(_) => "real",
            Self::Integer(_) => "integer",
        }
    }

    pub(crate) fn from_sqlite(value: SqliteValue) -> Result<Self, StoreError> {
        match value {
            SqliteValue::Null => Ok(Self::Text(None)),
            SqliteValue::Text(text) => Ok(Self::Text(Some(text))),
            SqliteValue::Real(real) => Ok(Self::Real(Some(real))),
            SqliteValue::Integer(int) => Ok(Self::Integer(Some(int))),
            SqliteValue::Blob(_) => Err(StoreError::Decode(
                "unexpected blob column in result row".to_string(),
            )),
        }
    }
}

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Text(Some(text)) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            Self::Real(Some(real)) => ToSqlOutput::Owned(SqliteValue::Real(*real)),
            Self::Integer(Some(int)) => ToSqlOutput::Owned(SqliteValue::Integer(*int)),
            Self::Text(None) | Self::Real(None) | Self::Integer(None) => {
                ToSqlOutput::Owned(SqliteValue::Null)
            }
        })
    }
}

/// Borrows parameters in the form the postgres client binds.
pub(crate) fn pg_params(values: &[SqlValue]) -> Vec<&(dyn PgToSql + Sync)> {
    values
        .iter()
        .map(|value| match value {
            SqlValue::Text(text) => text as &(dyn PgToSql + Sync),
            SqlValue::Real(real) => real as &(dyn PgToSql + Sync),
            SqlValue::Integer(int) => int as &(dyn PgToSql + Sync),
        })
        .collect()
}

pub(crate) fn from_pg_row(row: &postgres::Row) -> Result<RowValues, StoreError> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR {
            SqlValue::Text(row.try_get(idx).map_err(StoreError::Postgres)?)
        } else if *ty == Type::FLOAT8 {
            SqlValue::Real(row.try_get(idx).map_err(StoreError::Postgres)?)
        } else if *ty == Type::FLOAT4 {
            let real: Option<f32> = row.try_get(idx).map_err(StoreError::Postgres)?;
            SqlValue::Real(real.map(f64::from))
        } else if *ty == Type::INT8 {
            SqlValue::Integer(row.try_get(idx).map_err(StoreError::Postgres)?)
        } else if *ty == Type::INT4 {
            let int: Option<i32> = row.try_get(idx).map_err(StoreError::Postgres)?;
            SqlValue::Integer(int.map(i64::from))
        } else if *ty == Type::INT2 {
            let int: Option<i16> = row.try_get(idx).map_err(StoreError::Postgres)?;
            SqlValue::Integer(int.map(i64::from))
        } else {
            return Err(StoreError::Decode(format!(
                "unsupported column type `{}` in column `{}`",
                ty,
                column.name()
            )));
        };
        values.push(value);
    }
    Ok(RowValues(values))
}

/// One owned result row, accessed positionally against the SELECT list.
#[derive(Debug, Clone)]
pub struct RowValues(pub(crate) Vec<SqlValue>);

impl RowValues {
    fn cell(&self, idx: usize) -> Result<&SqlValue, StoreError> {
        self.0
            .get(idx)
            .ok_or_else(|| StoreError::Decode(format!("missing column at index {idx}")))
    }

    pub fn text(&self, idx: usize) -> Result<String, StoreError> {
        match self.cell(idx)? {
            SqlValue::Text(Some(text)) => Ok(text.clone()),
            other => Err(type_mismatch(idx, "text", other)),
        }
    }

    pub fn opt_text(&self, idx: usize) -> Result<Option<String>, StoreError> {
        let cell = self.cell(idx)?;
        if cell.is_null() {
            return Ok(None);
        }
        match cell {
            SqlValue::Text(Some(text)) => Ok(Some(text.clone())),
            other => Err(type_mismatch(idx, "text", other)),
        }
    }

    pub fn real(&self, idx: usize) -> Result<f64, StoreError> {
        match self.cell(idx)? {
            SqlValue::Real(Some(real)) => Ok(*real),
            SqlValue::Integer(Some(int)) => Ok(*int as f64),
            other => Err(type_mismatch(idx, "real", other)),
        }
    }

    pub fn opt_real(&self, idx: usize) -> Result<Option<f64>, StoreError> {
        let cell = self.cell(idx)?;
        if cell.is_null() {
            return Ok(None);
        }
        match cell {
            SqlValue::Real(Some(real)) => Ok(Some(*real)),
            SqlValue::Integer(Some(int)) => Ok(Some(*int as f64)),
            other => Err(type_mismatch(idx, "real", other)),
        }
    }

    pub fn integer(&self, idx: usize) -> Result<i64, StoreError> {
        match self.cell(idx)? {
            SqlValue::Integer(Some(int)) => Ok(*int),
            other => Err(type_mismatch(idx, "integer", other)),
        }
    }
}

fn type_mismatch(idx: usize, expected: &str, actual: &SqlValue) -> StoreError {
    if actual.is_null() {
        StoreError::Decode(format!(
            "unexpected NULL at column index {idx}, expected {expected}"
        ))
    } else {
        StoreError::Decode(format!(
            "expected {expected} at column index {idx}, found {}",
            actual.type_name()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{RowValues, SqlValue};

    #[test]
    fn accessors_accept_nulls_of_any_variant() {
        let row = RowValues(vec![SqlValue::Text(None), SqlValue::Real(None)]);
        assert_eq!(row.opt_real(0).unwrap(), None);
        assert_eq!(row.opt_text(1).unwrap(), None);
    }

    #[test]
    fn real_accessor_widens_stored_integers() {
        let row = RowValues(vec![SqlValue::Integer(Some(500))]);
        assert_eq!(row.real(0).unwrap(), 500.0);
        assert_eq!(row.opt_real(0).unwrap(), Some(500.0));
    }

    #[test]
    fn non_null_variant_mismatch_is_a_decode_error() {
        let row = RowValues(vec![SqlValue::Text(Some("oops".to_string()))]);
        let err = row.real(0).unwrap_err();
        assert!(err.to_string().contains("expected real"));
    }

    #[test]
    fn required_accessor_rejects_null() {
        let row = RowValues(vec![SqlValue::Text(None)]);
        assert!(row.text(0).is_err());
        assert!(row.integer(0).is_err());
    }
}
