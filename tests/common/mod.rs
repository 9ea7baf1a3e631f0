// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use divvy::application::SplitService;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(SplitService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = SplitService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Test fixture: a three-person trip group
pub struct TripGroup;

impl TripGroup {
    pub const NAME: &'static str = "trip";
    pub const ALICE: &'static str = "alice@example.com";
    pub const BOB: &'static str = "bob@example.com";
    pub const CAROL: &'static str = "carol@example.com";

    pub async fn create(service: &SplitService) -> Result<()> {
        service
            .create_group(
                Self::NAME.into(),
                "EUR".into(),
                vec![Self::ALICE.into(), Self::BOB.into(), Self::CAROL.into()],
                None,
            )
            .await?;
        Ok(())
    }

    pub fn everyone() -> Vec<String> {
        vec![Self::ALICE.into(), Self::BOB.into(), Self::CAROL.into()]
    }
}

/// Collect a group's balances as (member, cents) pairs for assertions.
pub async fn balance_pairs(service: &SplitService, group: &str) -> Result<Vec<(String, i64)>> {
    Ok(service
        .balances(group)
        .await?
        .into_iter()
        .map(|e| (e.member.to_string(), e.amount_cents))
        .collect())
}
