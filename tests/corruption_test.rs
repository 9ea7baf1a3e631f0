use anyhow::Result;
use divvy::application::{AppError, SplitService};
use sqlx::SqlitePool;
use tempfile::TempDir;

mod common;
use common::{parse_date, TripGroup};

/// Build a service and keep a raw pool onto the same database so tests can
/// vandalize stored documents behind the service's back.
async fn test_service_with_pool() -> Result<(SplitService, SqlitePool, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap());
    let service = SplitService::init(db_path.to_str().unwrap()).await?;
    let pool = SqlitePool::connect(&db_url).await?;
    Ok((service, pool, temp_dir))
}

#[tokio::test]
async fn test_corrupted_sheet_is_surfaced_not_repaired() -> Result<()> {
    let (service, pool, _temp) = test_service_with_pool().await?;
    TripGroup::create(&service).await?;
    service
        .add_expense(
            TripGroup::NAME,
            "dinner".into(),
            TripGroup::ALICE,
            9000,
            TripGroup::everyone(),
            parse_date("2024-06-01"),
            None,
        )
        .await?;

    // Drop Carol's debt on disk; the sheet no longer sums to zero.
    sqlx::query("UPDATE groups SET balances = ? WHERE name = ?")
        .bind(format!(
            r#"{{"{}":6000,"{}":-3000}}"#,
            TripGroup::ALICE,
            TripGroup::BOB
        ))
        .bind(TripGroup::NAME)
        .execute(&pool)
        .await?;

    // Reads and writes both refuse to touch the corrupted group.
    let err = service.settlement_plan(TripGroup::NAME).await.unwrap_err();
    assert!(matches!(err, AppError::InvariantViolation { residual_cents: 3000, .. }));

    let err = service
        .record_payment(TripGroup::NAME, TripGroup::BOB, TripGroup::ALICE, 1000, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvariantViolation { .. }));

    // The integrity check names the group and the leftover amount.
    let report = service.check_integrity().await?;
    assert!(!report.is_clean());
    assert_eq!(
        report.unbalanced_groups,
        vec![(TripGroup::NAME.to_string(), 3000)]
    );

    Ok(())
}

#[tokio::test]
async fn test_zero_entries_in_storage_are_pruned_on_load() -> Result<()> {
    let (service, pool, _temp) = test_service_with_pool().await?;
    TripGroup::create(&service).await?;

    // A zero entry is legal on disk (older writers kept them) but must not
    // show up in a snapshot.
    sqlx::query("UPDATE groups SET balances = ? WHERE name = ?")
        .bind(format!(
            r#"{{"{}":5000,"{}":-5000,"{}":0}}"#,
            TripGroup::ALICE,
            TripGroup::BOB,
            TripGroup::CAROL
        ))
        .bind(TripGroup::NAME)
        .execute(&pool)
        .await?;

    let balances = service.balances(TripGroup::NAME).await?;
    assert_eq!(balances.len(), 2);
    assert!(!balances
        .iter()
        .any(|e| e.member.as_str() == TripGroup::CAROL));

    Ok(())
}
