use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::{
    currency_supported, settlement, Balances, Cents, Expense, ExpenseId, ExpenseShare, Group,
    MemberId, Payment, PaymentEvent, PaymentId, SettlementInstruction,
};
use crate::storage::{IntegrityStats, Repository};

use super::reporting::{CategoryReport, CategorySummary, PeriodSummary, SpendingOverTimeReport};
use super::AppError;

/// Application service providing high-level operations over shared-expense
/// groups. This is the primary interface for any client (CLI, API, TUI).
///
/// Every balance mutation runs as one optimistic-concurrency critical
/// section: load the sheet with its version, mutate in memory, write
/// conditionally. A lost race surfaces as
/// [`AppError::ConcurrencyConflict`] and is never retried here; the
/// caller decides whether to re-read and try again.
pub struct SplitService {
    repo: Repository,
}

/// One member's net position, for display.
pub struct BalanceEntry {
    pub member: MemberId,
    pub amount_cents: Cents,
}

/// Result of the integrity check across the whole database.
pub struct IntegrityReport {
    pub stats: IntegrityStats,
    /// Groups whose stored sheet does not sum to zero, with the residual.
    pub unbalanced_groups: Vec<(String, Cents)>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.unbalanced_groups.is_empty()
            && self.stats.orphaned_expenses == 0
            && self.stats.orphaned_payments == 0
            && self.stats.non_positive_amounts == 0
    }
}

impl SplitService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Group operations
    // ========================

    /// Create a new group with the given members, all starting at zero.
    pub async fn create_group(
        &self,
        name: String,
        currency: String,
        members: Vec<String>,
        description: Option<String>,
    ) -> Result<Group, AppError> {
        if !currency_supported(&currency) {
            return Err(AppError::UnsupportedCurrency(currency));
        }
        if members.is_empty() {
            return Err(AppError::InvalidInput(
                "a group needs at least one member".to_string(),
            ));
        }

        let members = parse_members(members)?;

        if self.repo.get_group_by_name(&name).await?.is_some() {
            return Err(AppError::GroupAlreadyExists(name));
        }

        let mut group = Group::new(name, currency, members);
        if let Some(desc) = description {
            group = group.with_description(desc);
        }

        self.repo.save_group(&group).await?;
        Ok(group)
    }

    /// Get a group by name.
    pub async fn get_group(&self, name: &str) -> Result<Group, AppError> {
        self.repo
            .get_group_by_name(name)
            .await?
            .ok_or_else(|| AppError::GroupNotFound(name.to_string()))
    }

    /// List all groups.
    pub async fn list_groups(&self) -> Result<Vec<Group>, AppError> {
        Ok(self.repo.list_groups().await?)
    }

    /// Rename a group.
    pub async fn rename_group(&self, name: &str, new_name: &str) -> Result<Group, AppError> {
        let group = self.get_group(name).await?;
        if self.repo.get_group_by_name(new_name).await?.is_some() {
            return Err(AppError::GroupAlreadyExists(new_name.to_string()));
        }
        self.repo.rename_group(group.id, new_name).await?;
        self.get_group(new_name).await
    }

    /// Add a member to an existing group. New members start at zero, which
    /// the sheet represents by their absence.
    pub async fn add_member(&self, name: &str, member: &str) -> Result<Group, AppError> {
        let group = self.get_group(name).await?;
        let member = parse_member(member)?;
        self.repo.add_member(group.id, &member).await?;
        self.get_group(name).await
    }

    /// Remove a member. Refused while they still owe or are owed anything,
    /// since dropping a non-zero entry would break the zero-sum invariant.
    pub async fn remove_member(&self, name: &str, member: &str) -> Result<Group, AppError> {
        let group = self.get_group(name).await?;
        let member = parse_member(member)?;
        if !group.is_member(&member) {
            return Err(AppError::NotAGroupMember {
                group: group.name.clone(),
                member: member.to_string(),
            });
        }

        let (sheet, _version) = self.load_sheet(&group).await?;
        let balance = sheet.get(&member);
        if balance != 0 {
            return Err(AppError::MemberHasBalance {
                member: member.to_string(),
                balance_cents: balance,
            });
        }

        self.repo.remove_member(group.id, &member).await?;
        self.get_group(name).await
    }

    /// Delete a group and every expense and payment recorded against it.
    pub async fn delete_group(&self, name: &str) -> Result<Group, AppError> {
        let group = self.get_group(name).await?;
        self.repo.delete_group(group.id).await?;
        Ok(group)
    }

    // ========================
    // Expense operations
    // ========================

    /// Record a shared expense and apply its split to the group's sheet.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_expense(
        &self,
        group_name: &str,
        expense_name: String,
        owner: &str,
        amount_cents: Cents,
        participants: Vec<String>,
        spent_at: DateTime<Utc>,
        category: Option<String>,
    ) -> Result<Expense, AppError> {
        let group = self.get_group(group_name).await?;
        let share = self.build_share(&group, owner, amount_cents, participants)?;

        let (mut sheet, version) = self.load_sheet(&group).await?;
        sheet.apply_expense(&share);
        self.ensure_balanced(&group, &sheet)?;

        let mut expense = Expense::new(group.id, expense_name, share, spent_at);
        if let Some(category) = category {
            expense = expense.with_category(category);
        }
        if !self
            .repo
            .insert_expense(&expense, &sheet, version)
            .await?
        {
            return Err(AppError::ConcurrencyConflict { group_id: group.id });
        }

        Ok(expense)
    }

    /// Edit an expense. The old split is reversed and the new one applied
    /// in a single in-memory step, then persisted as one conditional write,
    /// so no observer can see the half-edited state.
    #[allow(clippy::too_many_arguments)]
    pub async fn edit_expense(
        &self,
        expense_id: ExpenseId,
        expense_name: String,
        owner: &str,
        amount_cents: Cents,
        participants: Vec<String>,
        spent_at: DateTime<Utc>,
        category: Option<String>,
    ) -> Result<Expense, AppError> {
        let old = self
            .repo
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(expense_id.to_string()))?;
        let group = self
            .repo
            .get_group(old.group_id)
            .await?
            .ok_or_else(|| AppError::GroupNotFound(old.group_id.to_string()))?;

        let new_share = self.build_share(&group, owner, amount_cents, participants)?;

        let (mut sheet, version) = self.load_sheet(&group).await?;
        sheet.reverse_expense(&old.share);
        sheet.apply_expense(&new_share);
        self.ensure_balanced(&group, &sheet)?;

        let updated = Expense {
            name: expense_name,
            category,
            share: new_share,
            spent_at,
            ..old
        };
        if !self
            .repo
            .update_expense(&updated, &sheet, version)
            .await?
        {
            return Err(AppError::ConcurrencyConflict { group_id: group.id });
        }

        Ok(updated)
    }

    /// Delete an expense, reversing its split.
    pub async fn delete_expense(&self, expense_id: ExpenseId) -> Result<Expense, AppError> {
        let expense = self
            .repo
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(expense_id.to_string()))?;
        let group = self
            .repo
            .get_group(expense.group_id)
            .await?
            .ok_or_else(|| AppError::GroupNotFound(expense.group_id.to_string()))?;

        let (mut sheet, version) = self.load_sheet(&group).await?;
        sheet.reverse_expense(&expense.share);
        self.ensure_balanced(&group, &sheet)?;

        if !self
            .repo
            .delete_expense(expense.id, group.id, &sheet, version)
            .await?
        {
            return Err(AppError::ConcurrencyConflict { group_id: group.id });
        }

        Ok(expense)
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, expense_id: ExpenseId) -> Result<Expense, AppError> {
        self.repo
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(expense_id.to_string()))
    }

    /// List a group's expenses.
    pub async fn list_expenses(&self, group_name: &str) -> Result<Vec<Expense>, AppError> {
        let group = self.get_group(group_name).await?;
        Ok(self.repo.list_expenses(group.id).await?)
    }

    /// Running total of everything the group has spent.
    pub async fn group_total(&self, group_name: &str) -> Result<Cents, AppError> {
        let group = self.get_group(group_name).await?;
        Ok(self.repo.group_total(group.id).await?)
    }

    // ========================
    // Payment operations
    // ========================

    /// Record a confirmed payment from one member to another. When the
    /// money moved through an external gateway, `external_ref` carries the
    /// verified order id; verification itself happened before this call.
    pub async fn record_payment(
        &self,
        group_name: &str,
        payer: &str,
        payee: &str,
        amount_cents: Cents,
        note: Option<String>,
        external_ref: Option<String>,
    ) -> Result<Payment, AppError> {
        let group = self.get_group(group_name).await?;
        let payer = parse_member(payer)?;
        let payee = parse_member(payee)?;
        for member in [&payer, &payee] {
            self.ensure_member(&group, member)?;
        }

        let event = PaymentEvent::new(payer, payee, amount_cents)
            .map_err(|e| AppError::from_ledger(e, group.id))?;

        let (mut sheet, version) = self.load_sheet(&group).await?;
        sheet.apply_payment(&event);
        self.ensure_balanced(&group, &sheet)?;

        let mut payment = Payment::new(group.id, event, Utc::now());
        if let Some(note) = note {
            payment = payment.with_note(note);
        }
        if let Some(external_ref) = external_ref {
            payment = payment.with_external_ref(external_ref);
        }

        if !self
            .repo
            .insert_payment(&payment, &sheet, version)
            .await?
        {
            return Err(AppError::ConcurrencyConflict { group_id: group.id });
        }

        info!(
            group = %group.name,
            payer = %payment.event.payer(),
            payee = %payment.event.payee(),
            amount_cents = payment.event.amount_cents(),
            "payment recorded"
        );
        Ok(payment)
    }

    /// List a group's payments.
    pub async fn list_payments(&self, group_name: &str) -> Result<Vec<Payment>, AppError> {
        let group = self.get_group(group_name).await?;
        Ok(self.repo.list_payments(group.id).await?)
    }

    /// Get a payment by ID.
    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<Payment, AppError> {
        self.repo
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::PaymentNotFound(payment_id.to_string()))
    }

    // ========================
    // Queries
    // ========================

    /// Current balances, sorted by member id. Read-only snapshot.
    pub async fn balances(&self, group_name: &str) -> Result<Vec<BalanceEntry>, AppError> {
        let group = self.get_group(group_name).await?;
        let (sheet, _version) = self.load_sheet(&group).await?;
        Ok(sheet
            .iter()
            .map(|(member, amount_cents)| BalanceEntry {
                member: member.clone(),
                amount_cents,
            })
            .collect())
    }

    /// Who owes whom: the settlement plan for the group's current sheet.
    /// Computed from a read-only snapshot and never mutates anything.
    pub async fn settlement_plan(
        &self,
        group_name: &str,
    ) -> Result<Vec<SettlementInstruction>, AppError> {
        let group = self.get_group(group_name).await?;
        let (sheet, _version) = self.load_sheet(&group).await?;
        settlement::plan(&sheet).map_err(|e| AppError::from_ledger(e, group.id))
    }

    // ========================
    // Reports
    // ========================

    /// Spending per category for one group, largest first. Uncategorized
    /// expenses land in a single "uncategorized" bucket.
    pub async fn category_report(&self, group_name: &str) -> Result<CategoryReport, AppError> {
        let group = self.get_group(group_name).await?;
        let aggregates = self.repo.sum_expenses_by_category(group.id).await?;

        let total: Cents = aggregates.iter().map(|a| a.total).sum();
        let categories = aggregates
            .into_iter()
            .map(|a| CategorySummary {
                average: a.total / a.count.max(1),
                percentage: if total > 0 {
                    a.total as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
                category: a.category,
                total: a.total,
                count: a.count,
            })
            .collect();

        Ok(CategoryReport {
            group: group.name,
            categories,
            total,
        })
    }

    /// Spending per calendar month for one group, oldest first.
    pub async fn monthly_report(
        &self,
        group_name: &str,
    ) -> Result<SpendingOverTimeReport, AppError> {
        self.period_report(group_name, 7).await
    }

    /// Spending per calendar day for one group, oldest first.
    pub async fn daily_report(
        &self,
        group_name: &str,
    ) -> Result<SpendingOverTimeReport, AppError> {
        self.period_report(group_name, 10).await
    }

    async fn period_report(
        &self,
        group_name: &str,
        period_len: u32,
    ) -> Result<SpendingOverTimeReport, AppError> {
        let group = self.get_group(group_name).await?;
        let aggregates = self.repo.sum_expenses_by_period(group.id, period_len).await?;

        let total: Cents = aggregates.iter().map(|a| a.total).sum();
        let periods = aggregates
            .into_iter()
            .map(|a| PeriodSummary {
                period: a.period,
                total: a.total,
                count: a.count,
            })
            .collect();

        Ok(SpendingOverTimeReport {
            group: group.name,
            periods,
            total,
        })
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check every group's stored sheet plus cross-table consistency.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;
        let groups = self.repo.list_groups().await?;

        let mut unbalanced_groups = Vec::new();
        for group in &groups {
            if let Some(stored) = self.repo.load_balances(group.id).await? {
                let residual: Cents = stored.entries.values().sum();
                if residual != 0 {
                    warn!(
                        group = %group.name,
                        residual_cents = residual,
                        "stored balance sheet violates zero-sum invariant"
                    );
                    unbalanced_groups.push((group.name.clone(), residual));
                }
            }
        }

        Ok(IntegrityReport {
            stats,
            unbalanced_groups,
        })
    }

    // ========================
    // Internals
    // ========================

    /// Load and validate a group's sheet together with its version token.
    /// A stored sheet that fails validation is surfaced as corruption,
    /// never patched up in place.
    async fn load_sheet(&self, group: &Group) -> Result<(Balances, i64), AppError> {
        let stored = self
            .repo
            .load_balances(group.id)
            .await?
            .ok_or_else(|| AppError::GroupNotFound(group.name.clone()))?;

        let sheet = Balances::from_entries(stored.entries).map_err(|e| {
            warn!(group = %group.name, error = %e, "stored balance sheet rejected");
            AppError::from_ledger(e, group.id)
        })?;
        Ok((sheet, stored.version))
    }

    fn ensure_member(&self, group: &Group, member: &MemberId) -> Result<(), AppError> {
        if !group.is_member(member) {
            return Err(AppError::NotAGroupMember {
                group: group.name.clone(),
                member: member.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_balanced(&self, group: &Group, sheet: &Balances) -> Result<(), AppError> {
        if !sheet.is_balanced() {
            warn!(
                group = %group.name,
                residual_cents = sheet.residual(),
                "balance sheet unbalanced after mutation"
            );
            return Err(AppError::InvariantViolation {
                group_id: group.id,
                residual_cents: sheet.residual(),
            });
        }
        Ok(())
    }

    fn build_share(
        &self,
        group: &Group,
        owner: &str,
        amount_cents: Cents,
        participants: Vec<String>,
    ) -> Result<ExpenseShare, AppError> {
        let owner = parse_member(owner)?;
        let participants = parse_members(participants)?;

        self.ensure_member(group, &owner)?;
        for member in &participants {
            self.ensure_member(group, member)?;
        }

        ExpenseShare::new(owner, amount_cents, participants)
            .map_err(|e| AppError::from_ledger(e, group.id))
    }
}

fn parse_member(raw: &str) -> Result<MemberId, AppError> {
    MemberId::new(raw).map_err(|e| AppError::InvalidInput(e.to_string()))
}

fn parse_members(raw: Vec<String>) -> Result<BTreeSet<MemberId>, AppError> {
    raw.into_iter().map(|m| parse_member(&m)).collect()
}
