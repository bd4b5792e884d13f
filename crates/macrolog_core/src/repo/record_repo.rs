//! Record repository contract and SQL implementation.
//!
//! # Responsibility
//! - CRUD over User, Meal and Targets with ownership scoping.
//! - Dialect-agnostic statement construction through `SqlDialect`.
//!
//! # Invariants
//! - Meal reads/updates/deletes filter by `(id, user_id)` together, never
//!   by `id` alone.
//! - Targets writes are single-statement upserts; duplicate rows per user
//!   cannot occur.
//! - Users are created implicitly by the first meal write.

use crate::db::conn::StoreConnection;
use crate::db::schema::{MEAL_COLUMNS, TARGET_COLUMNS, USER_COLUMNS};
use crate::db::value::{RowValues, SqlValue};
use crate::db::StoreError;
use crate::model::meal::{Meal, MealDraft, MealValidationError};
use crate::model::targets::{Targets, TargetsDraft};
use crate::model::{meal::validate_user_id, now_epoch_ms};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Meal columns replaced wholesale by an update.
const MEAL_UPDATE_COLUMNS: &[&str] = &[
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
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error taxonomy surfaced to the HTTP collaborator.
#[derive(Debug)]
pub enum RepoError {
    Validation(MealValidationError),
    NotFound { entity: &'static str, id: String },
    Store(StoreError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<MealValidationError> for RepoError {
    fn from(value: MealValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Record access contract consumed by the service layer.
pub trait RecordRepository {
    /// Idempotent user creation; an existing row is kept silently.
    fn ensure_user(&mut self, user_id: &str, email: Option<&str>) -> RepoResult<()>;
    /// All meals owned by `user_id`, newest date first, then newest created.
    fn list_meals(&mut self, user_id: &str) -> RepoResult<Vec<Meal>>;
    /// Inserts one meal, creating the owner implicitly; returns the id.
    fn create_meal(&mut self, user_id: &str, draft: &MealDraft) -> RepoResult<String>;
    /// Replaces every payload field of the meal owned by `(id, user_id)`.
    fn update_meal(&mut self, meal_id: &str, user_id: &str, draft: &MealDraft) -> RepoResult<()>;
    /// Deletes the meal owned by `(id, user_id)`.
    fn delete_meal(&mut self, meal_id: &str, user_id: &str) -> RepoResult<()>;
    /// The user's targets, or `None` when never set.
    fn get_targets(&mut self, user_id: &str) -> RepoResult<Option<Targets>>;
    /// Insert-or-update keyed on `user_id` as one atomic statement.
    fn upsert_targets(&mut self, user_id: &str, draft: &TargetsDraft) -> RepoResult<()>;
}

/// Repository over a live connection to either backend dialect.
pub struct SqlRecordRepository<'conn> {
    conn: &'conn mut StoreConnection,
}

impl<'conn> SqlRecordRepository<'conn> {
    pub fn new(conn: &'conn mut StoreConnection) -> Self {
        Self { conn }
    }

    fn meal_select_sql(&self) -> String {
        format!("SELECT {} FROM meals", MEAL_COLUMNS.join(", "))
    }
}

impl RecordRepository for SqlRecordRepository<'_> {
    fn ensure_user(&mut self, user_id: &str, email: Option<&str>) -> RepoResult<()> {
        validate_user_id(user_id)?;
        let sql = self.conn.dialect().insert_or_ignore("users", USER_COLUMNS);
        self.conn.execute(
            &sql,
            &[
                SqlValue::text(user_id),
                SqlValue::opt_text(email),
                SqlValue::integer(now_epoch_ms()),
            ],
        )?;
        Ok(())
    }

    fn list_meals(&mut self, user_id: &str) -> RepoResult<Vec<Meal>> {
        validate_user_id(user_id)?;
        let dialect = self.conn.dialect();
        let sql = format!(
            "{} WHERE user_id = {} ORDER BY date DESC, created_at DESC",
            self.meal_select_sql(),
            dialect.placeholder(1)
        );
        let rows = self.conn.query(&sql, &[SqlValue::text(user_id)])?;
        rows.iter().map(parse_meal_row).collect()
    }

    fn create_meal(&mut self, user_id: &str, draft: &MealDraft) -> RepoResult<String> {
        draft.validate(user_id)?;
        self.ensure_user(user_id, None)?;

        let meal_id = draft
            .id
            .clone()
            .unwrap_or_else(|| now_epoch_ms().to_string());
        let dialect = self.conn.dialect();
        let sql = format!(
            "INSERT INTO meals ({}) VALUES ({})",
            MEAL_COLUMNS.join(", "),
            dialect.placeholder_list(MEAL_COLUMNS.len())
        );

        let mut params = vec![
            SqlValue::text(meal_id.as_str()),
            SqlValue::text(user_id),
            SqlValue::text(draft.date.as_str()),
            SqlValue::text(draft.resolved_name()),
            SqlValue::text(encode_food_items(draft)?),
        ];
        params.extend(meal_payload_values(draft));
        params.push(SqlValue::integer(now_epoch_ms()));

        self.conn.execute(&sql, &params)?;
        Ok(meal_id)
    }

    fn update_meal(&mut self, meal_id: &str, user_id: &str, draft: &MealDraft) -> RepoResult<()> {
        draft.validate(user_id)?;

        let dialect = self.conn.dialect();
        let assignments = dialect.assignment_list(MEAL_UPDATE_COLUMNS, 1);
        let sql = format!(
            "UPDATE meals SET {assignments} WHERE id = {} AND user_id = {}",
            dialect.placeholder(MEAL_UPDATE_COLUMNS.len() + 1),
            dialect.placeholder(MEAL_UPDATE_COLUMNS.len() + 2)
        );

        let mut params = vec![
            SqlValue::text(draft.date.as_str()),
            SqlValue::text(draft.resolved_name()),
            SqlValue::text(encode_food_items(draft)?),
        ];
        params.extend(meal_payload_values(draft));
        params.push(SqlValue::text(meal_id));
        params.push(SqlValue::text(user_id));

        let changed = self.conn.execute(&sql, &params)?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "meal",
                id: meal_id.to_string(),
            });
        }
        Ok(())
    }

    fn delete_meal(&mut self, meal_id: &str, user_id: &str) -> RepoResult<()> {
        validate_user_id(user_id)?;
        let dialect = self.conn.dialect();
        let sql = format!(
            "DELETE FROM meals WHERE id = {} AND user_id = {}",
            dialect.placeholder(1),
            dialect.placeholder(2)
        );
        let changed = self
            .conn
            .execute(&sql, &[SqlValue::text(meal_id), SqlValue::text(user_id)])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "meal",
                id: meal_id.to_string(),
            });
        }
        Ok(())
    }

    fn get_targets(&mut self, user_id: &str) -> RepoResult<Option<Targets>> {
        validate_user_id(user_id)?;
        let dialect = self.conn.dialect();
        let sql = format!(
            "SELECT {} FROM targets WHERE user_id = {}",
            TARGET_COLUMNS.join(", "),
            dialect.placeholder(1)
        );
        let row = self.conn.query_one(&sql, &[SqlValue::text(user_id)])?;
        row.as_ref().map(parse_targets_row).transpose()
    }

    fn upsert_targets(&mut self, user_id: &str, draft: &TargetsDraft) -> RepoResult<()> {
        validate_user_id(user_id)?;
        let sql = self
            .conn
            .dialect()
            .upsert("targets", TARGET_COLUMNS, "user_id");
        self.conn.execute(
            &sql,
            &[
                SqlValue::text(user_id),
                SqlValue::real(draft.calories),
                SqlValue::real(draft.protein),
                SqlValue::real(draft.carbs),
                SqlValue::real(draft.fat),
                SqlValue::opt_real(draft.processed_percent),
                SqlValue::opt_real(draft.fiber),
                SqlValue::opt_real(draft.caffeine),
                SqlValue::opt_real(draft.fresh_produce),
                SqlValue::integer(now_epoch_ms()),
            ],
        )?;
        Ok(())
    }
}

/// Payload values shared by insert and update, in wire-column order
/// starting at `calories`.
fn meal_payload_values(draft: &MealDraft) -> Vec<SqlValue> {
    vec![
        SqlValue::real(draft.calories),
        SqlValue::real(draft.protein),
        SqlValue::real(draft.carbs),
        SqlValue::real(draft.fat),
        SqlValue::opt_real(draft.metrics.processed_calories),
        SqlValue::opt_real(draft.metrics.processed_percent),
        SqlValue::opt_real(draft.metrics.ultra_processed_calories),
        SqlValue::opt_real(draft.metrics.ultra_processed_percent),
        SqlValue::opt_real(draft.metrics.fiber),
        SqlValue::opt_real(draft.metrics.caffeine),
        SqlValue::opt_real(draft.metrics.fresh_produce),
        SqlValue::opt_text(draft.image_url.as_deref()),
    ]
}

fn encode_food_items(draft: &MealDraft) -> RepoResult<String> {
    serde_json::to_string(&draft.food_items)
        .map_err(|err| RepoError::InvalidData(format!("food_items not serializable: {err}")))
}

fn parse_meal_row(row: &RowValues) -> RepoResult<Meal> {
    let food_items_json = row.text(4)?;
    let food_items = serde_json::from_str(&food_items_json).map_err(|err| {
        RepoError::InvalidData(format!("invalid food_items payload in meals row: {err}"))
    })?;

    Ok(Meal {
        id: row.text(0)?,
        user_id: row.text(1)?,
        date: row.text(2)?,
        name: row.text(3)?,
        food_items,
        calories: row.real(5)?,
        protein: row.real(6)?,
        carbs: row.real(7)?,
        fat: row.real(8)?,
        metrics: crate::model::meal::ExtendedMetrics {
            processed_calories: row.opt_real(9)?,
            processed_percent: row.opt_real(10)?,
            ultra_processed_calories: row.opt_real(11)?,
            ultra_processed_percent: row.opt_real(12)?,
            fiber: row.opt_real(13)?,
            caffeine: row.opt_real(14)?,
            fresh_produce: row.opt_real(15)?,
        },
        image_url: row.opt_text(16)?,
        created_at: row.integer(17)?,
    })
}

fn parse_targets_row(row: &RowValues) -> RepoResult<Targets> {
    Ok(Targets {
        user_id: row.text(0)?,
        calories: row.real(1)?,
        protein: row.real(2)?,
        carbs: row.real(3)?,
        fat: row.real(4)?,
        processed_percent: row.opt_real(5)?,
        fiber: row.opt_real(6)?,
        caffeine: row.opt_real(7)?,
        fresh_produce: row.opt_real(8)?,
        updated_at: row.integer(9)?,
    })
}
