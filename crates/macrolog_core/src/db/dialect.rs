//! SQL statement builder for the two backend dialects.
//!
//! # Responsibility
//! - Own the two points of repository-visible divergence: placeholder style
//!   and upsert phrasing.
//! - Own the column-type names and introspection queries migrations need.
//!
//! # Invariants
//! - Placeholder ordinals are 1-based in both dialects.
//! - Every query built here is valid against the other dialect's twin
//!   schema, so repository code stays dialect-free.

/// Active backend dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
}

impl SqlDialect {
    /// Renders the 1-based bind placeholder for `ordinal`.
    pub fn placeholder(self, ordinal: usize) -> String {
        match self {
            Self::Sqlite => format!("?{ordinal}"),
            Self::Postgres => format!("${ordinal}"),
        }
    }

    /// Renders `count` comma-separated placeholders starting at ordinal 1.
    pub fn placeholder_list(self, count: usize) -> String {
        (1..=count)
            .map(|ordinal| self.placeholder(ordinal))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders `col = ?N, ...` assignments with ordinals starting at `start`.
    pub fn assignment_list(self, columns: &[&str], start: usize) -> String {
        columns
            .iter()
            .enumerate()
            .map(|(offset, column)| format!("{column} = {}", self.placeholder(start + offset)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Insert that silently keeps an existing row on any uniqueness conflict.
    pub fn insert_or_ignore(self, table: &str, columns: &[&str]) -> String {
        let column_list = columns.join(", ");
        let placeholders = self.placeholder_list(columns.len());
        match self {
            Self::Sqlite => {
                format!("INSERT OR IGNORE INTO {table} ({column_list}) VALUES ({placeholders})")
            }
            Self::Postgres => format!(
                "INSERT INTO {table} ({column_list}) VALUES ({placeholders}) ON CONFLICT DO NOTHING"
            ),
        }
    }

    /// Single-statement upsert keyed on `key`, replacing all non-key columns.
    pub fn upsert(self, table: &str, columns: &[&str], key: &str) -> String {
        let column_list = columns.join(", ");
        let placeholders = self.placeholder_list(columns.len());
        match self {
            Self::Sqlite => {
                format!("INSERT OR REPLACE INTO {table} ({column_list}) VALUES ({placeholders})")
            }
            Self::Postgres => {
                let updates = columns
                    .iter()
                    .filter(|column| **column != key)
                    .map(|column| format!("{column} = EXCLUDED.{column}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "INSERT INTO {table} ({column_list}) VALUES ({placeholders}) \
                     ON CONFLICT ({key}) DO UPDATE SET {updates}"
                )
            }
        }
    }

    /// Column type for floating-point macro values.
    pub fn float_type(self) -> &'static str {
        match self {
            Self::Sqlite => "REAL",
            Self::Postgres => "DOUBLE PRECISION",
        }
    }

    /// Column type for epoch-millisecond timestamps.
    pub fn bigint_type(self) -> &'static str {
        match self {
            Self::Sqlite => "INTEGER",
            Self::Postgres => "BIGINT",
        }
    }

    /// Counts tables with the bound name; one text parameter.
    pub fn table_exists_sql(self) -> &'static str {
        match self {
            Self::Sqlite => {
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1"
            }
            Self::Postgres => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
            }
        }
    }

    /// Counts columns matching the bound (table, column) pair.
    pub fn column_exists_sql(self) -> &'static str {
        match self {
            Self::Sqlite => "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            Self::Postgres => {
                "SELECT COUNT(*) FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2"
            }
        }
    }

    /// Selects the declared type of the bound (table, column) pair.
    pub fn column_type_sql(self) -> &'static str {
        match self {
            Self::Sqlite => "SELECT type FROM pragma_table_info(?1) WHERE name = ?2",
            Self::Postgres => {
                "SELECT data_type FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2"
            }
        }
    }

    /// Whether a declared column type is the legacy numeric meal key type.
    pub fn is_legacy_numeric(self, declared: &str) -> bool {
        let normalized = declared.trim().to_ascii_uppercase();
        normalized.contains("INT") || normalized == "NUMERIC" || normalized == "REAL"
    }

    /// Whether a backend error message reports an already-existing column.
    pub fn is_duplicate_column_error(self, message: &str) -> bool {
        let normalized = message.to_ascii_lowercase();
        normalized.contains("duplicate column") || normalized.contains("already exists")
    }
}
