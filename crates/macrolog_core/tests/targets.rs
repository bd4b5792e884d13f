use macrolog_core::db::value::SqlValue;
use macrolog_core::{FoodLogService, MealValidationError, RepoError, StoreConfig, TargetsDraft};
use tempfile::TempDir;

fn embedded_service(dir: &TempDir) -> FoodLogService {
    let config = StoreConfig::embedded(dir.path().join("targets.db"));
    let (service, report) = FoodLogService::bootstrap(&config).unwrap();
    assert!(!report.has_failures());
    service
}

#[test]
fn absent_targets_read_as_none_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let service = embedded_service(&dir);

    assert!(service.get_targets("nobody").unwrap().is_none());
}

#[test]
fn upsert_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let service = embedded_service(&dir);

    let payload = TargetsDraft {
        calories: 2200.0,
        protein: 150.0,
        carbs: 240.0,
        fat: 70.0,
        processed_percent: Some(20.0),
        fiber: Some(30.0),
        caffeine: Some(200.0),
        fresh_produce: Some(40.0),
    };
    service.upsert_targets("u1", &payload).unwrap();

    let stored = service.get_targets("u1").unwrap().unwrap();
    assert_eq!(stored.user_id, "u1");
    assert_eq!(stored.calories, 2200.0);
    assert_eq!(stored.protein, 150.0);
    assert_eq!(stored.carbs, 240.0);
    assert_eq!(stored.fat, 70.0);
    assert_eq!(stored.processed_percent, Some(20.0));
    assert_eq!(stored.fiber, Some(30.0));
    assert_eq!(stored.caffeine, Some(200.0));
    assert_eq!(stored.fresh_produce, Some(40.0));
    assert!(stored.updated_at > 0);
}

#[test]
fn second_upsert_replaces_without_duplicating_rows() {
    let dir = tempfile::tempdir().unwrap();
    let service = embedded_service(&dir);

    service
        .upsert_targets(
            "u1",
            &TargetsDraft {
                calories: 2000.0,
                protein: 120.0,
                carbs: 200.0,
                fat: 60.0,
                fiber: Some(25.0),
                ..TargetsDraft::default()
            },
        )
        .unwrap();
    service
        .upsert_targets(
            "u1",
            &TargetsDraft {
                calories: 1800.0,
                protein: 140.0,
                carbs: 170.0,
                fat: 55.0,
                ..TargetsDraft::default()
            },
        )
        .unwrap();

    let stored = service.get_targets("u1").unwrap().unwrap();
    assert_eq!(stored.calories, 1800.0);
    assert_eq!(stored.protein, 140.0);
    // Second payload omitted the extended fields; the row reflects the
    // full replacement, not a merge.
    assert_eq!(stored.fiber, None);

    let mut conn = service.provider().open().unwrap();
    let row = conn
        .query_one(
            "SELECT COUNT(*) FROM targets WHERE user_id = ?1",
            &[SqlValue::text("u1")],
        )
        .unwrap()
        .unwrap();
    assert_eq!(row.integer(0).unwrap(), 1);
}

#[test]
fn targets_are_isolated_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let service = embedded_service(&dir);

    service
        .upsert_targets(
            "u1",
            &TargetsDraft {
                calories: 2000.0,
                ..TargetsDraft::default()
            },
        )
        .unwrap();

    assert!(service.get_targets("u2").unwrap().is_none());
}

#[test]
fn blank_user_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let service = embedded_service(&dir);

    let err = service
        .upsert_targets("", &TargetsDraft::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(MealValidationError::MissingUserId)
    ));
}
