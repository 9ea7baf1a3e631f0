use anyhow::Result;
use divvy::application::AppError;

mod common;
use common::{balance_pairs, parse_date, test_service, TripGroup};

#[tokio::test]
async fn test_payment_clears_two_member_debt() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .create_group(
            "flat".into(),
            "EUR".into(),
            vec!["a@x.com".into(), "b@x.com".into()],
            None,
        )
        .await?;

    // a pays 100.00 for both: a +50, b -50.
    service
        .add_expense(
            "flat",
            "rent share".into(),
            "a@x.com",
            10000,
            vec!["a@x.com".into(), "b@x.com".into()],
            parse_date("2024-03-01"),
            None,
        )
        .await?;

    service
        .record_payment("flat", "b@x.com", "a@x.com", 5000, None, None)
        .await?;

    // Both pruned to zero.
    assert!(balance_pairs(&service, "flat").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_partial_payment_shrinks_the_plan() -> Result<()> {
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

    service
        .record_payment(TripGroup::NAME, TripGroup::BOB, TripGroup::ALICE, 1000, None, None)
        .await?;

    let plan = service.settlement_plan(TripGroup::NAME).await?;
    assert_eq!(plan.len(), 2);
    // Carol still owes the full 30.00, Bob the remaining 20.00.
    assert_eq!(plan[0].from.as_str(), TripGroup::CAROL);
    assert_eq!(plan[0].amount_cents, 3000);
    assert_eq!(plan[1].from.as_str(), TripGroup::BOB);
    assert_eq!(plan[1].amount_cents, 2000);

    Ok(())
}

#[tokio::test]
async fn test_plan_matches_largest_debtor_to_largest_creditor() -> Result<()> {
    let (service, _temp) = test_service().await?;
    TripGroup::create(&service).await?;

    // alice +50, bob -20, carol -30.
    service
        .add_expense(
            TripGroup::NAME,
            "tickets".into(),
            TripGroup::ALICE,
            6000,
            vec![TripGroup::ALICE.into(), TripGroup::BOB.into(), TripGroup::CAROL.into()],
            parse_date("2024-06-01"),
            None,
        )
        .await?;
    service
        .add_expense(
            TripGroup::NAME,
            "taxi".into(),
            TripGroup::ALICE,
            1000,
            vec![TripGroup::CAROL.into()],
            parse_date("2024-06-01"),
            None,
        )
        .await?;

    assert_eq!(
        balance_pairs(&service, TripGroup::NAME).await?,
        vec![
            (TripGroup::ALICE.to_string(), 5000),
            (TripGroup::BOB.to_string(), -2000),
            (TripGroup::CAROL.to_string(), -3000),
        ]
    );

    let plan = service.settlement_plan(TripGroup::NAME).await?;
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].from.as_str(), TripGroup::CAROL);
    assert_eq!(plan[0].to.as_str(), TripGroup::ALICE);
    assert_eq!(plan[0].amount_cents, 3000);
    assert_eq!(plan[1].from.as_str(), TripGroup::BOB);
    assert_eq!(plan[1].to.as_str(), TripGroup::ALICE);
    assert_eq!(plan[1].amount_cents, 2000);

    Ok(())
}

#[tokio::test]
async fn test_following_the_plan_settles_the_group() -> Result<()> {
    let (service, _temp) = test_service().await?;
    TripGroup::create(&service).await?;

    // A messy trip: uneven splits, different owners, partial subsets.
    service
        .add_expense(
            TripGroup::NAME,
            "hotel".into(),
            TripGroup::ALICE,
            25000,
            TripGroup::everyone(),
            parse_date("2024-06-01"),
            None,
        )
        .await?;
    service
        .add_expense(
            TripGroup::NAME,
            "dinner".into(),
            TripGroup::BOB,
            10001,
            TripGroup::everyone(),
            parse_date("2024-06-02"),
            None,
        )
        .await?;
    service
        .add_expense(
            TripGroup::NAME,
            "museum".into(),
            TripGroup::CAROL,
            1999,
            vec![TripGroup::ALICE.into(), TripGroup::CAROL.into()],
            parse_date("2024-06-03"),
            None,
        )
        .await?;

    let plan = service.settlement_plan(TripGroup::NAME).await?;
    assert!(plan.len() <= 2);

    // Record each instruction as a real payment; the group must end empty.
    for step in &plan {
        assert!(step.amount_cents > 0);
        service
            .record_payment(
                TripGroup::NAME,
                step.from.as_str(),
                step.to.as_str(),
                step.amount_cents,
                None,
                None,
            )
            .await?;
    }

    assert!(balance_pairs(&service, TripGroup::NAME).await?.is_empty());
    assert!(service.settlement_plan(TripGroup::NAME).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_payment_records_note_and_external_ref() -> Result<()> {
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

    service
        .record_payment(
            TripGroup::NAME,
            TripGroup::BOB,
            TripGroup::ALICE,
            3000,
            Some("paid via app".into()),
            Some("order_9f2c".into()),
        )
        .await?;

    let payments = service.list_payments(TripGroup::NAME).await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].note.as_deref(), Some("paid via app"));
    assert_eq!(payments[0].external_ref.as_deref(), Some("order_9f2c"));
    assert_eq!(payments[0].event.amount_cents(), 3000);

    Ok(())
}

#[tokio::test]
async fn test_payment_lookup_by_id() -> Result<()> {
    let (service, _temp) = test_service().await?;
    TripGroup::create(&service).await?;

    let recorded = service
        .record_payment(
            TripGroup::NAME,
            TripGroup::BOB,
            TripGroup::ALICE,
            2500,
            Some("cash".into()),
            None,
        )
        .await?;

    let payment = service.get_payment(recorded.id).await?;
    assert_eq!(payment.id, recorded.id);
    assert_eq!(payment.event.amount_cents(), 2500);
    assert_eq!(payment.note.as_deref(), Some("cash"));

    let err = service.get_payment(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::PaymentNotFound(_)));

    Ok(())
}
