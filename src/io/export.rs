use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::SplitService;
use crate::domain::{Expense, Group, Payment};

/// Snapshot of one group for full JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSnapshot {
    pub group: Group,
    pub balances: Vec<(String, i64)>,
    pub expenses: Vec<Expense>,
    pub payments: Vec<Payment>,
}

/// Database snapshot for full export.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub groups: Vec<GroupSnapshot>,
}

/// Exporter for converting ledger data to tabular or JSON formats.
pub struct Exporter<'a> {
    service: &'a SplitService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a SplitService) -> Self {
        Self { service }
    }

    /// Export a group's balances to CSV format.
    pub async fn export_balances_csv<W: Write>(&self, group: &str, writer: W) -> Result<usize> {
        let entries = self.service.balances(group).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["member", "balance_cents"])?;

        let mut count = 0;
        for entry in &entries {
            csv_writer.write_record([
                entry.member.to_string(),
                entry.amount_cents.to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export a group's expenses to CSV format.
    pub async fn export_expenses_csv<W: Write>(&self, group: &str, writer: W) -> Result<usize> {
        let expenses = self.service.list_expenses(group).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "name",
            "category",
            "owner",
            "amount_cents",
            "participants",
            "spent_at",
        ])?;

        let mut count = 0;
        for expense in &expenses {
            let participants: Vec<&str> = expense
                .share
                .participants()
                .iter()
                .map(|m| m.as_str())
                .collect();
            csv_writer.write_record([
                expense.id.to_string(),
                expense.name.clone(),
                expense.category.clone().unwrap_or_default(),
                expense.share.owner().to_string(),
                expense.share.total_cents().to_string(),
                participants.join(";"),
                expense.spent_at.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export a group's settlement plan to CSV format.
    pub async fn export_settlement_csv<W: Write>(&self, group: &str, writer: W) -> Result<usize> {
        let plan = self.service.settlement_plan(group).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["from", "to", "amount_cents"])?;

        let mut count = 0;
        for step in &plan {
            csv_writer.write_record([
                step.from.to_string(),
                step.to.to_string(),
                step.amount_cents.to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the full database as a JSON snapshot.
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let groups = self.service.list_groups().await?;

        let mut snapshots = Vec::with_capacity(groups.len());
        for group in groups {
            let balances = self
                .service
                .balances(&group.name)
                .await?
                .into_iter()
                .map(|e| (e.member.to_string(), e.amount_cents))
                .collect();
            let expenses = self.service.list_expenses(&group.name).await?;
            let payments = self.service.list_payments(&group.name).await?;
            snapshots.push(GroupSnapshot {
                group,
                balances,
                expenses,
                payments,
            });
        }

        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            groups: snapshots,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
