//! Schema creation and in-place migration.
//!
//! # Responsibility
//! - Bring a store of any prior schema generation to the current shape
//!   without data loss.
//! - Report per-step outcomes so operators see best-effort failures.
//!
//! # Invariants
//! - Every step re-checks current state by introspection; there is no
//!   schema version counter to drift from reality.
//! - Steps are ordered; appending a new named step is the only way the
//!   list changes.
//! - A failed step never aborts startup; the failure is logged and
//!   recorded in the returned report.

use super::conn::StoreConnection;
use super::dialect::SqlDialect;
use super::value::SqlValue;
use super::{StoreError, StoreResult};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Wire-contract column order for the meals table.
///
/// Shared with the repository so DDL, rebuild copies and DML stay aligned.
pub(crate) const MEAL_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "date",
    "name",
    "food_items",
    "calories",
    "protein",
    "carbs",
    "fat",
    "processed_calories",
    "processed_percent",
    "ultra_processed_calories",
    "ultra_processed_percent",
    "fiber",
    "caffeine",
    "fresh_produce",
    "image_url",
    "created_at",
];

pub(crate) const USER_COLUMNS: &[&str] = &["user_id", "email", "created_at"];

pub(crate) const TARGET_COLUMNS: &[&str] = &[
    "user_id",
    "calories",
    "protein",
    "carbs",
    "fat",
    "processed_percent",
    "fiber",
    "caffeine",
    "fresh_produce",
    "updated_at",
];

/// Meal columns added after the first schema generation, each applied
/// independently of the others.
const EXTENDED_MEAL_COLUMNS: &[(&str, ColumnKind)] = &[
    ("processed_calories", ColumnKind::Float),
    ("processed_percent", ColumnKind::Float),
    ("ultra_processed_calories", ColumnKind::Float),
    ("ultra_processed_percent", ColumnKind::Float),
    ("fiber", ColumnKind::Float),
    ("caffeine", ColumnKind::Float),
    ("fresh_produce", ColumnKind::Float),
    ("image_url", ColumnKind::Text),
];

const REBUILD_SHADOW_TABLE: &str = "meals_id_rebuild";

#[derive(Clone, Copy)]
enum ColumnKind {
    Float,
    Text,
}

impl ColumnKind {
    fn sql_type(self, dialect: SqlDialect) -> &'static str {
        match self {
            Self::Float => dialect.float_type(),
            Self::Text => "TEXT",
        }
    }
}

/// Fatal schema-management failure: the connection cannot run queries at
/// all. Per-step failures are reported, not raised.
#[derive(Debug)]
pub enum SchemaError {
    Unavailable(StoreError),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(err) => write!(f, "store unavailable for schema management: {err}"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(err) => Some(err),
        }
    }
}

/// Outcome of one named migration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The step changed the schema.
    Applied,
    /// The precondition showed the store already current.
    Skipped,
    /// The step failed; the schema may be partially upgraded.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: &'static str,
    pub status: StepStatus,
}

/// Per-step outcomes of one `ensure_schema` run.
#[derive(Debug, Clone, Default)]
pub struct SchemaReport {
    pub steps: Vec<StepReport>,
}

impl SchemaReport {
    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|step| matches!(step.status, StepStatus::Failed(_)))
    }

    pub fn failed_steps(&self) -> Vec<&StepReport> {
        self.steps
            .iter()
            .filter(|step| matches!(step.status, StepStatus::Failed(_)))
            .collect()
    }
}

type StepFn = fn(&mut StoreConnection) -> StoreResult<StepStatus>;

const STEPS: &[(&str, StepFn)] = &[
    ("create_users", create_users),
    ("create_meals", create_meals),
    ("create_targets", create_targets),
    ("meals_name_column", meals_name_column),
    ("meals_extended_metric_columns", meals_extended_metric_columns),
    ("meals_id_text_rebuild", meals_id_text_rebuild),
];

/// Brings the store to the current schema, step by step.
///
/// Safe to run on an empty store and safe to run repeatedly: every step
/// checks its own precondition. Returns `Err` only when the connection
/// cannot execute the liveness probe.
pub fn ensure_schema(conn: &mut StoreConnection) -> Result<SchemaReport, SchemaError> {
    conn.query_one("SELECT 1", &[])
        .map_err(SchemaError::Unavailable)?;

    info!(
        "event=schema_ensure module=db status=start dialect={:?}",
        conn.dialect()
    );

    let mut report = SchemaReport::default();
    for &(name, step) in STEPS {
        let status = match step(conn) {
            Ok(status) => status,
            Err(err) => StepStatus::Failed(err.to_string()),
        };
        match &status {
            StepStatus::Applied => {
                info!("event=schema_step module=db status=applied step={name}");
            }
            StepStatus::Skipped => {
                debug!("event=schema_step module=db status=skipped step={name}");
            }
            StepStatus::Failed(message) => {
                error!("event=schema_step module=db status=error step={name} error={message}");
            }
        }
        report.steps.push(StepReport { name, status });
    }

    let failed = report.failed_steps().len();
    info!(
        "event=schema_ensure module=db status={} steps={} failed={}",
        if failed == 0 { "ok" } else { "degraded" },
        report.steps.len(),
        failed
    );
    Ok(report)
}

fn create_users(conn: &mut StoreConnection) -> StoreResult<StepStatus> {
    if table_exists(conn, "users")? {
        return Ok(StepStatus::Skipped);
    }
    conn.batch(&users_ddl(conn.dialect()))?;
    Ok(StepStatus::Applied)
}

fn create_meals(conn: &mut StoreConnection) -> StoreResult<StepStatus> {
    if table_exists(conn, "meals")? {
        return Ok(StepStatus::Skipped);
    }
    conn.batch(&meals_ddl(conn.dialect(), "meals"))?;
    Ok(StepStatus::Applied)
}

fn create_targets(conn: &mut StoreConnection) -> StoreResult<StepStatus> {
    if table_exists(conn, "targets")? {
        return Ok(StepStatus::Skipped);
    }
    conn.batch(&targets_ddl(conn.dialect()))?;
    Ok(StepStatus::Applied)
}

/// Schema generation 1 shipped meals without a display name.
fn meals_name_column(conn: &mut StoreConnection) -> StoreResult<StepStatus> {
    if !table_exists(conn, "meals")? || column_exists(conn, "meals", "name")? {
        return Ok(StepStatus::Skipped);
    }
    match conn.batch("ALTER TABLE meals ADD COLUMN name TEXT NOT NULL DEFAULT 'Meal';") {
        Ok(()) => Ok(StepStatus::Applied),
        Err(err) if conn.dialect().is_duplicate_column_error(&err.to_string()) => {
            Ok(StepStatus::Skipped)
        }
        Err(err) => Err(err),
    }
}

/// Adds each extended-metric column independently; one column failing does
/// not stop the rest.
fn meals_extended_metric_columns(conn: &mut StoreConnection) -> StoreResult<StepStatus> {
    if !table_exists(conn, "meals")? {
        return Ok(StepStatus::Skipped);
    }

    let dialect = conn.dialect();
    let mut added = 0;
    let mut failures = Vec::new();
    for (column, kind) in EXTENDED_MEAL_COLUMNS {
        if column_exists(conn, "meals", column)? {
            continue;
        }
        let ddl = format!(
            "ALTER TABLE meals ADD COLUMN {column} {};",
            kind.sql_type(dialect)
        );
        match conn.batch(&ddl) {
            Ok(()) => added += 1,
            Err(err) if dialect.is_duplicate_column_error(&err.to_string()) => {}
            Err(err) => failures.push(format!("{column}: {err}")),
        }
    }

    if !failures.is_empty() {
        return Ok(StepStatus::Failed(failures.join("; ")));
    }
    if added == 0 {
        return Ok(StepStatus::Skipped);
    }
    Ok(StepStatus::Applied)
}

/// The first schema generation declared the meal key numeric (client
/// epoch-millisecond ids stored as integers). Rebuilds the table with a
/// text key, copying and casting every row, inside one transaction.
fn meals_id_text_rebuild(conn: &mut StoreConnection) -> StoreResult<StepStatus> {
    if !table_exists(conn, "meals")? {
        return Ok(StepStatus::Skipped);
    }
    let declared = match declared_column_type(conn, "meals", "id")? {
        Some(declared) => declared,
        None => return Ok(StepStatus::Skipped),
    };
    if !conn.dialect().is_legacy_numeric(&declared) {
        return Ok(StepStatus::Skipped);
    }

    let column_list = MEAL_COLUMNS.join(", ");
    let select_list = MEAL_COLUMNS
        .iter()
        .map(|column| {
            if *column == "id" {
                "CAST(id AS TEXT)".to_string()
            } else {
                (*column).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let body = format!(
        "DROP TABLE IF EXISTS {shadow};\n\
         {ddl}\n\
         INSERT INTO {shadow} ({column_list})\n\
         SELECT {select_list} FROM meals;\n\
         DROP TABLE meals;\n\
         ALTER TABLE {shadow} RENAME TO meals;",
        shadow = REBUILD_SHADOW_TABLE,
        ddl = meals_ddl(conn.dialect(), REBUILD_SHADOW_TABLE),
    );
    conn.batch_in_transaction(&body)?;
    Ok(StepStatus::Applied)
}

fn users_ddl(dialect: SqlDialect) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            email TEXT UNIQUE,
            created_at {bigint} NOT NULL
        );",
        bigint = dialect.bigint_type()
    )
}

fn meals_ddl(dialect: SqlDialect, table: &str) -> String {
    let float = dialect.float_type();
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT 'Meal',
            food_items TEXT NOT NULL DEFAULT '[]',
            calories {float} NOT NULL DEFAULT 0,
            protein {float} NOT NULL DEFAULT 0,
            carbs {float} NOT NULL DEFAULT 0,
            fat {float} NOT NULL DEFAULT 0,
            processed_calories {float},
            processed_percent {float},
            ultra_processed_calories {float},
            ultra_processed_percent {float},
            fiber {float},
            caffeine {float},
            fresh_produce {float},
            image_url TEXT,
            created_at {bigint} NOT NULL
        );",
        bigint = dialect.bigint_type()
    )
}

fn targets_ddl(dialect: SqlDialect) -> String {
    let float = dialect.float_type();
    format!(
        "CREATE TABLE IF NOT EXISTS targets (
            user_id TEXT PRIMARY KEY,
            calories {float} NOT NULL DEFAULT 0,
            protein {float} NOT NULL DEFAULT 0,
            carbs {float} NOT NULL DEFAULT 0,
            fat {float} NOT NULL DEFAULT 0,
            processed_percent {float},
            fiber {float},
            caffeine {float},
            fresh_produce {float},
            updated_at {bigint} NOT NULL
        );",
        bigint = dialect.bigint_type()
    )
}

fn table_exists(conn: &mut StoreConnection, table: &str) -> StoreResult<bool> {
    let sql = conn.dialect().table_exists_sql();
    match conn.query_one(sql, &[SqlValue::text(table)])? {
        Some(row) => Ok(row.integer(0)? > 0),
        None => Ok(false),
    }
}

fn column_exists(conn: &mut StoreConnection, table: &str, column: &str) -> StoreResult<bool> {
    let sql = conn.dialect().column_exists_sql();
    match conn.query_one(sql, &[SqlValue::text(table), SqlValue::text(column)])? {
        Some(row) => Ok(row.integer(0)? > 0),
        None => Ok(false),
    }
}

fn declared_column_type(
    conn: &mut StoreConnection,
    table: &str,
    column: &str,
) -> StoreResult<Option<String>> {
    let sql = conn.dialect().column_type_sql();
    let row = conn.query_one(sql, &[SqlValue::text(table), SqlValue::text(column)])?;
    row.map(|row| row.text(0)).transpose()
}
