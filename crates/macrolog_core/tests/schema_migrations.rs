use macrolog_core::db::value::SqlValue;
use macrolog_core::{
    ensure_schema, ConnectionProvider, RecordRepository, SqlRecordRepository, StepStatus,
    StoreConfig, StoreConnection,
};
use rusqlite::Connection;
use std::path::Path;

fn open_store(path: &Path) -> StoreConnection {
    let provider = ConnectionProvider::new(&StoreConfig::embedded(path)).unwrap();
    provider.open().unwrap()
}

fn step_status(report: &macrolog_core::SchemaReport, name: &str) -> StepStatus {
    report
        .steps
        .iter()
        .find(|step| step.name == name)
        .unwrap_or_else(|| panic!("missing step {name}"))
        .status
        .clone()
}

fn table_names(conn: &mut StoreConnection) -> Vec<String> {
    conn.query(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        &[],
    )
    .unwrap()
    .iter()
    .map(|row| row.text(0).unwrap())
    .collect()
}

#[test]
fn fresh_store_gets_all_tables_created() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_store(&dir.path().join("fresh.db"));

    let report = ensure_schema(&mut conn).unwrap();
    assert!(!report.has_failures());
    assert_eq!(step_status(&report, "create_users"), StepStatus::Applied);
    assert_eq!(step_status(&report, "create_meals"), StepStatus::Applied);
    assert_eq!(step_status(&report, "create_targets"), StepStatus::Applied);
    // A freshly created meals table is already current.
    assert_eq!(step_status(&report, "meals_name_column"), StepStatus::Skipped);
    assert_eq!(
        step_status(&report, "meals_extended_metric_columns"),
        StepStatus::Skipped
    );
    assert_eq!(
        step_status(&report, "meals_id_text_rebuild"),
        StepStatus::Skipped
    );

    let tables = table_names(&mut conn);
    for table in ["users", "meals", "targets"] {
        assert!(tables.iter().any(|name| name == table), "missing {table}");
    }
}

#[test]
fn second_run_is_a_complete_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_store(&dir.path().join("twice.db"));

    ensure_schema(&mut conn).unwrap();
    let second = ensure_schema(&mut conn).unwrap();

    assert!(!second.has_failures());
    assert!(
        second
            .steps
            .iter()
            .all(|step| step.status == StepStatus::Skipped),
        "second run must not change anything: {second:?}"
    );

    // No duplicate or leftover columns either.
    let columns = conn
        .query("SELECT COUNT(*) FROM pragma_table_info('meals')", &[])
        .unwrap();
    assert_eq!(columns[0].integer(0).unwrap(), 18);
}

#[test]
fn generation_one_store_is_upgraded_in_place_without_data_loss() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    // First-generation schema: numeric meal key, no display name, no
    // extended metrics, with one meal already logged.
    let legacy = Connection::open(&path).unwrap();
    legacy
        .execute_batch(
            "CREATE TABLE meals (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                food_items TEXT NOT NULL DEFAULT '[]',
                calories REAL NOT NULL DEFAULT 0,
                protein REAL NOT NULL DEFAULT 0,
                carbs REAL NOT NULL DEFAULT 0,
                fat REAL NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );
            INSERT INTO meals (id, user_id, date, food_items, calories, protein, carbs, fat, created_at)
            VALUES (1700000000000, 'legacy-user', '2023-11-14', '[\"eggs\",\"toast\"]', 450, 28, 40, 15, 1699999999999);",
        )
        .unwrap();
    drop(legacy);

    let mut conn = open_store(&path);
    let report = ensure_schema(&mut conn).unwrap();
    assert!(!report.has_failures(), "{report:?}");
    assert_eq!(step_status(&report, "create_meals"), StepStatus::Skipped);
    assert_eq!(step_status(&report, "meals_name_column"), StepStatus::Applied);
    assert_eq!(
        step_status(&report, "meals_extended_metric_columns"),
        StepStatus::Applied
    );
    assert_eq!(
        step_status(&report, "meals_id_text_rebuild"),
        StepStatus::Applied
    );

    // The key column is now declared text.
    let declared = conn
        .query_one(
            "SELECT type FROM pragma_table_info('meals') WHERE name = 'id'",
            &[],
        )
        .unwrap()
        .unwrap();
    assert_eq!(declared.text(0).unwrap(), "TEXT");

    // The logged meal survived, readable through the current repository.
    let mut repo = SqlRecordRepository::new(&mut conn);
    let meals = repo.list_meals("legacy-user").unwrap();
    assert_eq!(meals.len(), 1);
    let meal = &meals[0];
    assert_eq!(meal.id, "1700000000000");
    assert_eq!(meal.name, "Meal");
    assert_eq!(meal.date, "2023-11-14");
    assert_eq!(meal.calories, 450.0);
    assert_eq!(meal.fat, 15.0);
    assert_eq!(meal.created_at, 1699999999999);
    assert_eq!(
        meal.food_items,
        vec![
            serde_json::Value::from("eggs"),
            serde_json::Value::from("toast")
        ]
    );
    assert_eq!(meal.metrics.fiber, None);

    // The rebuild's shadow table must not survive.
    assert!(!table_names(&mut conn)
        .iter()
        .any(|name| name == "meals_id_rebuild"));

    // A further run finds everything current.
    let again = ensure_schema(&mut conn).unwrap();
    assert!(again
        .steps
        .iter()
        .all(|step| step.status == StepStatus::Skipped));
}

#[test]
fn partially_upgraded_store_only_gets_the_missing_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gen2.db");

    // Second generation: text key and name column exist, extended metrics
    // do not.
    let legacy = Connection::open(&path).unwrap();
    legacy
        .execute_batch(
            "CREATE TABLE meals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT 'Meal',
                food_items TEXT NOT NULL DEFAULT '[]',
                calories REAL NOT NULL DEFAULT 0,
                protein REAL NOT NULL DEFAULT 0,
                carbs REAL NOT NULL DEFAULT 0,
                fat REAL NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );",
        )
        .unwrap();
    drop(legacy);

    let mut conn = open_store(&path);
    let report = ensure_schema(&mut conn).unwrap();

    assert_eq!(step_status(&report, "meals_name_column"), StepStatus::Skipped);
    assert_eq!(
        step_status(&report, "meals_extended_metric_columns"),
        StepStatus::Applied
    );
    assert_eq!(
        step_status(&report, "meals_id_text_rebuild"),
        StepStatus::Skipped
    );

    // New columns are writable through the repository.
    let mut repo = SqlRecordRepository::new(&mut conn);
    let mut draft = macrolog_core::MealDraft {
        date: "2024-05-01".to_string(),
        calories: 320.0,
        ..macrolog_core::MealDraft::default()
    };
    draft.metrics.caffeine = Some(95.0);
    let id = repo.create_meal("u1", &draft).unwrap();
    let meals = repo.list_meals("u1").unwrap();
    assert_eq!(meals[0].id, id);
    assert_eq!(meals[0].metrics.caffeine, Some(95.0));
}

#[test]
fn ensure_schema_works_through_service_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::embedded(dir.path().join("boot.db"));

    let (_service, report) = macrolog_core::FoodLogService::bootstrap(&config).unwrap();
    assert!(!report.has_failures());

    let (_service, second) = macrolog_core::FoodLogService::bootstrap(&config).unwrap();
    assert!(second
        .steps
        .iter()
        .all(|step| step.status == StepStatus::Skipped));
}

#[test]
fn user_email_uniqueness_is_tolerated_by_ensure_user() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_store(&dir.path().join("emails.db"));
    ensure_schema(&mut conn).unwrap();

    let mut repo = SqlRecordRepository::new(&mut conn);
    repo.ensure_user("u1", Some("shared@example.com")).unwrap();
    // Same user again: silently kept.
    repo.ensure_user("u1", Some("other@example.com")).unwrap();
    // Different user colliding on the unique email: silently ignored too.
    repo.ensure_user("u2", Some("shared@example.com")).unwrap();

    let rows = conn
        .query("SELECT COUNT(*) FROM users", &[])
        .unwrap();
    assert_eq!(rows[0].integer(0).unwrap(), 1);

    let email = conn
        .query_one(
            "SELECT email FROM users WHERE user_id = ?1",
            &[SqlValue::text("u1")],
        )
        .unwrap()
        .unwrap();
    assert_eq!(email.opt_text(0).unwrap().as_deref(), Some("shared@example.com"));
}
