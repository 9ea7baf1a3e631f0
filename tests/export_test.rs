use anyhow::Result;
use divvy::io::Exporter;

mod common;
use common::{parse_date, test_service, TripGroup};

#[tokio::test]
async fn test_settlement_csv_export() -> Result<()> {
    let (service, _temp) = test_service().await?;
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

    let exporter = Exporter::new(&service);
    let mut buffer: Vec<u8> = Vec::new();
    let count = exporter
        .export_settlement_csv(TripGroup::NAME, &mut buffer)
        .await?;
    assert_eq!(count, 2);

    let csv = String::from_utf8(buffer)?;
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("from,to,amount_cents"));
    assert_eq!(
        lines.next(),
        Some(format!("{},{},3000", TripGroup::BOB, TripGroup::ALICE).as_str())
    );
    assert_eq!(
        lines.next(),
        Some(format!("{},{},3000", TripGroup::CAROL, TripGroup::ALICE).as_str())
    );

    Ok(())
}

#[tokio::test]
async fn test_balances_csv_export() -> Result<()> {
    let (service, _temp) = test_service().await?;
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

    let exporter = Exporter::new(&service);
    let mut buffer: Vec<u8> = Vec::new();
    let count = exporter
        .export_balances_csv(TripGroup::NAME, &mut buffer)
        .await?;
    assert_eq!(count, 3);

    let csv = String::from_utf8(buffer)?;
    assert!(csv.starts_with("member,balance_cents\n"));
    assert!(csv.contains(&format!("{},6000", TripGroup::ALICE)));

    Ok(())
}

#[tokio::test]
async fn test_expenses_csv_export_includes_category() -> Result<()> {
    let (service, _temp) = test_service().await?;
    TripGroup::create(&service).await?;
    service
        .add_expense(
            TripGroup::NAME,
            "dinner".into(),
            TripGroup::ALICE,
            9000,
            TripGroup::everyone(),
            parse_date("2024-06-01"),
            Some("food".into()),
        )
        .await?;

    let exporter = Exporter::new(&service);
    let mut buffer: Vec<u8> = Vec::new();
    let count = exporter
        .export_expenses_csv(TripGroup::NAME, &mut buffer)
        .await?;
    assert_eq!(count, 1);

    let csv = String::from_utf8(buffer)?;
    assert!(csv.starts_with("id,name,category,owner,amount_cents,participants,spent_at\n"));
    assert!(csv.contains(",dinner,food,"));

    Ok(())
}

#[tokio::test]
async fn test_full_json_export_covers_all_groups() -> Result<()> {
    let (service, _temp) = test_service().await?;
    TripGroup::create(&service).await?;
    service
        .create_group(
            "flat".into(),
            "USD".into(),
            vec!["a@x.com".into(), "b@x.com".into()],
            None,
        )
        .await?;

    let exporter = Exporter::new(&service);
    let mut buffer: Vec<u8> = Vec::new();
    let snapshot = exporter.export_full_json(&mut buffer).await?;

    assert_eq!(snapshot.groups.len(), 2);
    let parsed: serde_json::Value = serde_json::from_slice(&buffer)?;
    assert_eq!(parsed["groups"].as_array().unwrap().len(), 2);

    Ok(())
}
