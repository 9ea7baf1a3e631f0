use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::application::reporting::{CategoryAggregate, PeriodAggregate};
use crate::domain::{
    Balances, Cents, Expense, ExpenseId, ExpenseShare, Group, GroupId, MemberId, Payment,
    PaymentEvent, PaymentId,
};

use super::MIGRATION_001_INITIAL;

/// Statistics for integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub group_count: i64,
    pub expense_count: i64,
    pub payment_count: i64,
    pub orphaned_expenses: i64,
    pub orphaned_payments: i64,
    pub non_positive_amounts: i64,
}

/// Raw balance entries as stored, paired with the group's version token.
/// The service rebuilds a validated sheet from these; the repository never
/// interprets them.
#[derive(Debug, Clone)]
pub struct StoredBalances {
    pub entries: BTreeMap<MemberId, Cents>,
    pub version: i64,
}

/// Repository for persisting groups, expenses, payments, and each group's
/// balance sheet. The sheet is written as one JSON document per group, and
/// every write that touches it is conditional on the version read alongside
/// it: a stale version writes zero rows and the caller sees the conflict
/// instead of overwriting someone else's update.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Group operations
    // ========================

    /// Save a new group with an empty balance sheet at version 0.
    pub async fn save_group(&self, group: &Group) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO groups (id, name, currency, description, balances, version, created_at)
            VALUES (?, ?, ?, ?, '{}', 0, ?)
            "#,
        )
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(&group.currency)
        .bind(&group.description)
        .bind(group.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save group")?;

        for member in &group.members {
            sqlx::query("INSERT INTO group_members (group_id, member) VALUES (?, ?)")
                .bind(group.id.to_string())
                .bind(member.as_str())
                .execute(&mut *tx)
                .await
                .context("Failed to save group member")?;
        }

        tx.commit().await.context("Failed to commit group")?;
        Ok(())
    }

    /// Get a group by ID.
    pub async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        let row = sqlx::query(
            "SELECT id, name, currency, description, created_at FROM groups WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch group")?;

        match row {
            Some(row) => Ok(Some(self.hydrate_group(&row).await?)),
            None => Ok(None),
        }
    }

    /// Get a group by name.
    pub async fn get_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let row = sqlx::query(
            "SELECT id, name, currency, description, created_at FROM groups WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch group by name")?;

        match row {
            Some(row) => Ok(Some(self.hydrate_group(&row).await?)),
            None => Ok(None),
        }
    }

    /// List all groups, ordered by name.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query(
            "SELECT id, name, currency, description, created_at FROM groups ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list groups")?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            groups.push(self.hydrate_group(row).await?);
        }
        Ok(groups)
    }

    /// Rename a group.
    pub async fn rename_group(&self, id: GroupId, name: &str) -> Result<()> {
        sqlx::query("UPDATE groups SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to rename group")?;
        Ok(())
    }

    /// Add a member to a group. Idempotent.
    pub async fn add_member(&self, id: GroupId, member: &MemberId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO group_members (group_id, member) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(member.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to add group member")?;
        Ok(())
    }

    /// Remove a member from a group.
    pub async fn remove_member(&self, id: GroupId, member: &MemberId) -> Result<()> {
        sqlx::query("DELETE FROM group_members WHERE group_id = ? AND member = ?")
            .bind(id.to_string())
            .bind(member.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to remove group member")?;
        Ok(())
    }

    /// Delete a group and everything recorded against it.
    pub async fn delete_group(&self, id: GroupId) -> Result<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        for table in ["payments", "expenses", "group_members"] {
            sqlx::query(&format!("DELETE FROM {} WHERE group_id = ?", table))
                .bind(&id_str)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to delete {} for group", table))?;
        }
        sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to delete group")?;

        tx.commit().await.context("Failed to commit group deletion")?;
        Ok(())
    }

    async fn hydrate_group(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Group> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");
        let id = Uuid::parse_str(&id_str).context("Invalid group ID")?;

        let member_rows =
            sqlx::query("SELECT member FROM group_members WHERE group_id = ? ORDER BY member")
                .bind(&id_str)
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch group members")?;

        let mut members = BTreeSet::new();
        for member_row in &member_rows {
            let member: String = member_row.get("member");
            members.insert(MemberId::new(member).context("Invalid stored member id")?);
        }

        Ok(Group {
            id,
            name: row.get("name"),
            currency: row.get("currency"),
            description: row.get("description"),
            members,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Balance sheet operations
    // ========================

    /// Load a group's stored balance entries and version token.
    pub async fn load_balances(&self, id: GroupId) -> Result<Option<StoredBalances>> {
        let row = sqlx::query("SELECT balances, version FROM groups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load balances")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let json: String = row.get("balances");
        let version: i64 = row.get("version");
        let raw: BTreeMap<String, Cents> =
            serde_json::from_str(&json).context("Invalid stored balance document")?;

        let mut entries = BTreeMap::new();
        for (member, cents) in raw {
            entries.insert(
                MemberId::new(member).context("Invalid member id in balance document")?,
                cents,
            );
        }

        Ok(Some(StoredBalances { entries, version }))
    }

    /// Conditionally write a balance sheet: succeeds only if the stored
    /// version still matches `expected_version`. Returns false on a lost
    /// race without touching the row.
    pub async fn store_balances(
        &self,
        id: GroupId,
        balances: &Balances,
        expected_version: i64,
    ) -> Result<bool> {
        let json = serde_json::to_string(balances)?;
        let result = sqlx::query(
            "UPDATE groups SET balances = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(&json)
        .bind(id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .context("Failed to store balances")?;

        Ok(result.rows_affected() == 1)
    }

    // ========================
    // Expense operations
    // ========================

    /// Insert an expense row and the balance sheet it produced as one
    /// transaction. Returns false (and writes nothing) on a version race.
    pub async fn insert_expense(
        &self,
        expense: &Expense,
        balances: &Balances,
        expected_version: i64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !Self::store_balances_tx(&mut tx, expense.group_id, balances, expected_version).await? {
            return Ok(false);
        }

        let participants_json = serde_json::to_string(
            &expense
                .share
                .participants()
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>(),
        )?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, group_id, name, category, owner, amount_cents, participants, spent_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(expense.group_id.to_string())
        .bind(&expense.name)
        .bind(&expense.category)
        .bind(expense.share.owner().as_str())
        .bind(expense.share.total_cents())
        .bind(&participants_json)
        .bind(expense.spent_at.to_rfc3339())
        .bind(expense.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save expense")?;

        tx.commit().await.context("Failed to commit expense")?;
        Ok(true)
    }

    /// Replace an edited expense row together with the re-balanced sheet.
    /// One transaction, so a reverse+apply edit can never be torn.
    pub async fn update_expense(
        &self,
        expense: &Expense,
        balances: &Balances,
        expected_version: i64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !Self::store_balances_tx(&mut tx, expense.group_id, balances, expected_version).await? {
            return Ok(false);
        }

        let participants_json = serde_json::to_string(
            &expense
                .share
                .participants()
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>(),
        )?;

        sqlx::query(
            r#"
            UPDATE expenses
            SET name = ?, category = ?, owner = ?, amount_cents = ?, participants = ?, spent_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&expense.name)
        .bind(&expense.category)
        .bind(expense.share.owner().as_str())
        .bind(expense.share.total_cents())
        .bind(&participants_json)
        .bind(expense.spent_at.to_rfc3339())
        .bind(expense.id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update expense")?;

        tx.commit().await.context("Failed to commit expense update")?;
        Ok(true)
    }

    /// Delete an expense row together with the reversed sheet.
    pub async fn delete_expense(
        &self,
        expense_id: ExpenseId,
        group_id: GroupId,
        balances: &Balances,
        expected_version: i64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !Self::store_balances_tx(&mut tx, group_id, balances, expected_version).await? {
            return Ok(false);
        }

        sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(expense_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete expense")?;

        tx.commit().await.context("Failed to commit expense deletion")?;
        Ok(true)
    }

    async fn store_balances_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        id: GroupId,
        balances: &Balances,
        expected_version: i64,
    ) -> Result<bool> {
        let json = serde_json::to_string(balances)?;
        let result = sqlx::query(
            "UPDATE groups SET balances = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(&json)
        .bind(id.to_string())
        .bind(expected_version)
        .execute(&mut **tx)
        .await
        .context("Failed to store balances")?;

        Ok(result.rows_affected() == 1)
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(
            r#"
            SELECT id, group_id, name, category, owner, amount_cents, participants, spent_at, created_at
            FROM expenses
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_expense(&row)?)),
            None => Ok(None),
        }
    }

    /// List a group's expenses, newest spend first.
    pub async fn list_expenses(&self, group_id: GroupId) -> Result<Vec<Expense>> {
        let rows = sqlx::query(
            r#"
            SELECT id, group_id, name, category, owner, amount_cents, participants, spent_at, created_at
            FROM expenses
            WHERE group_id = ?
            ORDER BY spent_at DESC, created_at DESC
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// Running total of everything the group has spent.
    pub async fn group_total(&self, group_id: GroupId) -> Result<Cents> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount_cents), 0) as total FROM expenses WHERE group_id = ?",
        )
        .bind(group_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum group expenses")?;

        Ok(row.get("total"))
    }

    /// Total spend and expense count per category for one group. NULL
    /// categories collapse into one "uncategorized" bucket. Largest spend
    /// first, category name breaking ties.
    pub async fn sum_expenses_by_category(
        &self,
        group_id: GroupId,
    ) -> Result<Vec<CategoryAggregate>> {
        let rows = sqlx::query(
            r#"
            SELECT COALESCE(category, 'uncategorized') as category,
                   COUNT(*) as count,
                   SUM(amount_cents) as total
            FROM expenses
            WHERE group_id = ?
            GROUP BY COALESCE(category, 'uncategorized')
            ORDER BY total DESC, category ASC
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate expenses by category")?;

        Ok(rows
            .iter()
            .map(|row| CategoryAggregate {
                category: row.get("category"),
                count: row.get("count"),
                total: row.get("total"),
            })
            .collect())
    }

    /// Total spend and expense count per calendar bucket for one group.
    /// `period_len` is the prefix length taken from the RFC 3339 `spent_at`
    /// column: 7 buckets by month ("2024-06"), 10 by day ("2024-06-01").
    pub async fn sum_expenses_by_period(
        &self,
        group_id: GroupId,
        period_len: u32,
    ) -> Result<Vec<PeriodAggregate>> {
        let rows = sqlx::query(
            r#"
            SELECT substr(spent_at, 1, ?) as period,
                   COUNT(*) as count,
                   SUM(amount_cents) as total
            FROM expenses
            WHERE group_id = ?
            GROUP BY period
            ORDER BY period ASC
            "#,
        )
        .bind(period_len)
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate expenses by period")?;

        Ok(rows
            .iter()
            .map(|row| PeriodAggregate {
                period: row.get("period"),
                count: row.get("count"),
                total: row.get("total"),
            })
            .collect())
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let id_str: String = row.get("id");
        let group_id_str: String = row.get("group_id");
        let owner: String = row.get("owner");
        let participants_json: String = row.get("participants");
        let spent_at_str: String = row.get("spent_at");
        let created_at_str: String = row.get("created_at");

        let raw_participants: Vec<String> =
            serde_json::from_str(&participants_json).context("Invalid participants document")?;
        let mut participants = BTreeSet::new();
        for member in raw_participants {
            participants.insert(MemberId::new(member).context("Invalid participant id")?);
        }

        let share = ExpenseShare::new(
            MemberId::new(owner).context("Invalid owner id")?,
            row.get("amount_cents"),
            participants,
        )
        .context("Stored expense fails validation")?;

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            group_id: Uuid::parse_str(&group_id_str).context("Invalid group ID")?,
            name: row.get("name"),
            category: row.get("category"),
            share,
            spent_at: DateTime::parse_from_rfc3339(&spent_at_str)
                .context("Invalid spent_at timestamp")?
                .with_timezone(&Utc),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Payment operations
    // ========================

    /// Insert a payment row and the balance sheet it produced as one
    /// transaction. Returns false on a version race.
    pub async fn insert_payment(
        &self,
        payment: &Payment,
        balances: &Balances,
        expected_version: i64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !Self::store_balances_tx(&mut tx, payment.group_id, balances, expected_version).await? {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO payments (id, group_id, payer, payee, amount_cents, note, external_ref, paid_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.group_id.to_string())
        .bind(payment.event.payer().as_str())
        .bind(payment.event.payee().as_str())
        .bind(payment.event.amount_cents())
        .bind(&payment.note)
        .bind(&payment.external_ref)
        .bind(payment.paid_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save payment")?;

        tx.commit().await.context("Failed to commit payment")?;
        Ok(true)
    }

    /// List a group's payments, newest first.
    pub async fn list_payments(&self, group_id: GroupId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, group_id, payer, payee, amount_cents, note, external_ref, paid_at
            FROM payments
            WHERE group_id = ?
            ORDER BY paid_at DESC
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list payments")?;

        rows.iter().map(Self::row_to_payment).collect()
    }

    fn row_to_payment(row: &sqlx::sqlite::SqliteRow) -> Result<Payment> {
        let id_str: String = row.get("id");
        let group_id_str: String = row.get("group_id");
        let payer: String = row.get("payer");
        let payee: String = row.get("payee");
        let paid_at_str: String = row.get("paid_at");

        let event = PaymentEvent::new(
            MemberId::new(payer).context("Invalid payer id")?,
            MemberId::new(payee).context("Invalid payee id")?,
            row.get("amount_cents"),
        )
        .context("Stored payment fails validation")?;

        Ok(Payment {
            id: Uuid::parse_str(&id_str).context("Invalid payment ID")?,
            group_id: Uuid::parse_str(&group_id_str).context("Invalid group ID")?,
            event,
            note: row.get("note"),
            external_ref: row.get("external_ref"),
            paid_at: DateTime::parse_from_rfc3339(&paid_at_str)
                .context("Invalid paid_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    /// Get a payment by ID.
    pub async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            r#"
            SELECT id, group_id, payer, payee, amount_cents, note, external_ref, paid_at
            FROM payments
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch payment")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_payment(&row)?)),
            None => Ok(None),
        }
    }

    // ========================
    // Integrity operations
    // ========================

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let group_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM groups")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let expense_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM expenses")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let payment_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM payments")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let orphaned_expenses: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM expenses e
            WHERE NOT EXISTS (SELECT 1 FROM groups g WHERE g.id = e.group_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let orphaned_payments: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM payments p
            WHERE NOT EXISTS (SELECT 1 FROM groups g WHERE g.id = p.group_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let non_positive_amounts: i64 = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM expenses WHERE amount_cents <= 0) +
                (SELECT COUNT(*) FROM payments WHERE amount_cents <= 0) as count
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(IntegrityStats {
            group_count,
            expense_count,
            payment_count,
            orphaned_expenses,
            orphaned_payments,
            non_positive_amounts,
        })
    }
}
