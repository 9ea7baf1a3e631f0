use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, GroupId, LedgerError, MemberId};

pub type ExpenseId = Uuid;

/// One shared expense: `owner` paid `total_cents` on behalf of
/// `participants`, to be split evenly. The owner may or may not take part
/// in the split themselves. Pure value object; construction is the only
/// place its preconditions are checked, so a held `ExpenseShare` is always
/// safe to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseShare {
    owner: MemberId,
    total_cents: Cents,
    participants: BTreeSet<MemberId>,
}

impl ExpenseShare {
    pub fn new(
        owner: MemberId,
        total_cents: Cents,
        participants: BTreeSet<MemberId>,
    ) -> Result<Self, LedgerError> {
        if total_cents <= 0 {
            return Err(LedgerError::NonPositiveAmount {
                amount_cents: total_cents,
            });
        }
        if participants.is_empty() {
            return Err(LedgerError::EmptyParticipants);
        }
        Ok(Self {
            owner,
            total_cents,
            participants,
        })
    }

    pub fn owner(&self) -> &MemberId {
        &self.owner
    }

    pub fn total_cents(&self) -> Cents {
        self.total_cents
    }

    pub fn participants(&self) -> &BTreeSet<MemberId> {
        &self.participants
    }

    /// Even share per participant, rounded down. The remainder of an
    /// indivisible split is absorbed by the owner when the expense is
    /// applied to a balance sheet.
    pub fn share_cents(&self) -> Cents {
        self.total_cents / self.participants.len() as Cents
    }
}

/// A recorded expense as persisted. The balance effect lives entirely in
/// the [`ExpenseShare`] it carries; the rest is bookkeeping for listing,
/// editing, and deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub group_id: GroupId,
    /// Short human label ("dinner", "fuel").
    pub name: String,
    /// Free-form spending category ("food", "travel"); reports group by it.
    pub category: Option<String>,
    pub share: ExpenseShare,
    /// When the money was actually spent.
    pub spent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(group_id: GroupId, name: String, share: ExpenseShare, spent_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            name,
            category: None,
            share,
            spent_at,
            created_at: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(s: &str) -> MemberId {
        MemberId::new(s).unwrap()
    }

    fn members(names: &[&str]) -> BTreeSet<MemberId> {
        names.iter().map(|n| member(n)).collect()
    }

    #[test]
    fn test_expense_share_rejects_non_positive_amount() {
        let err = ExpenseShare::new(member("a"), 0, members(&["a", "b"])).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount { .. }));

        let err = ExpenseShare::new(member("a"), -100, members(&["a", "b"])).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount { .. }));
    }

    #[test]
    fn test_expense_share_rejects_empty_participants() {
        let err = ExpenseShare::new(member("a"), 100, BTreeSet::new()).unwrap_err();
        assert!(matches!(err, LedgerError::EmptyParticipants));
    }

    #[test]
    fn test_share_cents_rounds_down() {
        let expense = ExpenseShare::new(member("a"), 10000, members(&["a", "b", "c"])).unwrap();
        assert_eq!(expense.share_cents(), 3333);
    }
}
