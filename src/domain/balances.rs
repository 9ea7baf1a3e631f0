use std::collections::BTreeMap;

use serde::Serialize;

use super::{Cents, ExpenseShare, MemberId, PaymentEvent};

/// Per-group balance sheet: each member's signed net position in minor
/// units. Positive means the group owes the member, negative means the
/// member owes the group. Members at exactly zero are pruned rather than
/// kept as zero entries.
///
/// Invariant: the values sum to exactly zero after every completed
/// mutation. All arithmetic is integer; an indivisible split's remainder is
/// assigned to the expense owner, never dropped.
///
/// The only ways to obtain one are [`Balances::new`] and
/// [`Balances::from_entries`], so a malformed sheet is unrepresentable
/// instead of being re-checked at every call site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Balances {
    entries: BTreeMap<MemberId, Cents>,
}

impl Balances {
    /// Empty sheet for a freshly created group. Trivially balanced.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a sheet from stored entries. Zero entries are pruned; a
    /// non-zero sum is data corruption and is rejected, never silently
    /// corrected.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (MemberId, Cents)>,
    ) -> Result<Self, LedgerError> {
        let mut sheet = Self {
            entries: entries.into_iter().collect(),
        };
        sheet.prune_zeros();
        let residual = sheet.residual();
        if residual != 0 {
            return Err(LedgerError::Unbalanced {
                residual_cents: residual,
            });
        }
        Ok(sheet)
    }

    /// Record a shared expense: the owner is credited the full amount, each
    /// participant is debited the even share, and the owner absorbs
    /// whatever residual integer division left behind so the sum lands
    /// back at exactly zero.
    pub fn apply_expense(&mut self, expense: &ExpenseShare) {
        self.shift_expense(expense, 1);
    }

    /// Exact inverse of [`Balances::apply_expense`], used when an expense
    /// is deleted or edited (reverse old, apply new).
    pub fn reverse_expense(&mut self, expense: &ExpenseShare) {
        self.shift_expense(expense, -1);
    }

    fn shift_expense(&mut self, expense: &ExpenseShare, direction: Cents) {
        let share = expense.share_cents();
        *self.entries.entry(expense.owner().clone()).or_insert(0) +=
            direction * expense.total_cents();
        for member in expense.participants() {
            *self.entries.entry(member.clone()).or_insert(0) -= direction * share;
        }
        // Per-participant rounding alone does not guarantee a zero sum when
        // the amount is not divisible by the participant count. One
        // corrective step pushes the residual onto the owner.
        let residual = self.residual();
        *self.entries.entry(expense.owner().clone()).or_insert(0) -= residual;
        self.prune_zeros();
    }

    /// Record a direct payment: payer down, payee up. A debtor paying a
    /// creditor moves both toward zero, but direction is not policed here.
    pub fn apply_payment(&mut self, payment: &PaymentEvent) {
        *self.entries.entry(payment.payer().clone()).or_insert(0) -= payment.amount_cents();
        *self.entries.entry(payment.payee().clone()).or_insert(0) += payment.amount_cents();
        self.prune_zeros();
    }

    /// Drop entries that have reached exactly zero. Every mutation calls
    /// this before returning; settled members simply disappear.
    pub fn prune_zeros(&mut self) {
        self.entries.retain(|_, cents| *cents != 0);
    }

    /// Sum of all entries. Zero whenever the invariant holds.
    pub fn residual(&self) -> Cents {
        self.entries.values().sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.residual() == 0
    }

    pub fn get(&self, member: &MemberId) -> Cents {
        self.entries.get(member).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in member-id order. Stable across calls, which keeps
    /// settlement tie-breaking and persistence deterministic.
    pub fn iter(&self) -> impl Iterator<Item = (&MemberId, Cents)> {
        self.entries.iter().map(|(member, cents)| (member, *cents))
    }

    /// Test-only escape hatch to fabricate a corrupted sheet and exercise
    /// the invariant checks that normal construction makes unreachable.
    #[cfg(test)]
    pub(crate) fn from_entries_unchecked(
        entries: impl IntoIterator<Item = (MemberId, Cents)>,
    ) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount was zero or negative where a positive amount is required.
    NonPositiveAmount { amount_cents: Cents },
    /// An expense must be split among at least one participant.
    EmptyParticipants,
    /// The zero-sum invariant does not hold; carries the leftover sum.
    Unbalanced { residual_cents: Cents },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::NonPositiveAmount { amount_cents } => {
                write!(f, "amount must be positive, got {} cents", amount_cents)
            }
            LedgerError::EmptyParticipants => {
                write!(f, "an expense needs at least one participant")
            }
            LedgerError::Unbalanced { residual_cents } => {
                write!(
                    f,
                    "balance sheet does not sum to zero ({} cents left over)",
                    residual_cents
                )
            }
        }
    }
}

impl std::error::Error for LedgerError {}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn member(s: &str) -> MemberId {
        MemberId::new(s).unwrap()
    }

    fn participants(names: &[&str]) -> BTreeSet<MemberId> {
        names.iter().map(|n| member(n)).collect()
    }

    fn expense(owner: &str, total: Cents, names: &[&str]) -> ExpenseShare {
        ExpenseShare::new(member(owner), total, participants(names)).unwrap()
    }

    #[test]
    fn test_even_split() {
        let mut sheet = Balances::new();
        sheet.apply_expense(&expense("a", 9000, &["a", "b", "c"]));

        assert_eq!(sheet.get(&member("a")), 6000);
        assert_eq!(sheet.get(&member("b")), -3000);
        assert_eq!(sheet.get(&member("c")), -3000);
        assert!(sheet.is_balanced());
    }

    #[test]
    fn test_uneven_split_owner_absorbs_remainder() {
        // 100.00 across three people: 33.33 each, 0.01 left over.
        let mut sheet = Balances::new();
        sheet.apply_expense(&expense("a", 10000, &["a", "b", "c"]));

        assert_eq!(sheet.get(&member("b")), -3333);
        assert_eq!(sheet.get(&member("c")), -3333);
        // Owner paid 10000, owes a 3334 share after absorbing the cent.
        assert_eq!(sheet.get(&member("a")), 6666);
        assert!(sheet.is_balanced());
    }

    #[test]
    fn test_owner_not_participating() {
        let mut sheet = Balances::new();
        sheet.apply_expense(&expense("a", 9000, &["b", "c"]));

        assert_eq!(sheet.get(&member("a")), 9000);
        assert_eq!(sheet.get(&member("b")), -4500);
        assert_eq!(sheet.get(&member("c")), -4500);
        assert!(sheet.is_balanced());
    }

    #[test]
    fn test_reverse_is_exact_inverse() {
        let e1 = expense("a", 10000, &["a", "b", "c"]);
        let e2 = expense("b", 777, &["b", "c"]);

        let mut sheet = Balances::new();
        sheet.apply_expense(&e1);
        let snapshot = sheet.clone();

        sheet.apply_expense(&e2);
        sheet.reverse_expense(&e2);
        assert_eq!(sheet, snapshot);

        sheet.reverse_expense(&e1);
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_payment_prunes_settled_members() {
        let mut sheet = Balances::new();
        sheet.apply_expense(&expense("a", 10000, &["b", "a"]));
        assert_eq!(sheet.get(&member("a")), 5000);
        assert_eq!(sheet.get(&member("b")), -5000);

        let payment = PaymentEvent::new(member("b"), member("a"), 5000).unwrap();
        sheet.apply_payment(&payment);

        assert!(sheet.is_empty());
    }

    #[test]
    fn test_partial_payment_keeps_remainder() {
        let mut sheet = Balances::new();
        sheet.apply_expense(&expense("a", 10000, &["b", "a"]));

        let payment = PaymentEvent::new(member("b"), member("a"), 2000).unwrap();
        sheet.apply_payment(&payment);

        assert_eq!(sheet.get(&member("a")), 3000);
        assert_eq!(sheet.get(&member("b")), -3000);
        assert!(sheet.is_balanced());
    }

    #[test]
    fn test_zero_sum_across_mixed_sequence() {
        let mut sheet = Balances::new();
        let steps = [
            expense("a", 10000, &["a", "b", "c"]),
            expense("b", 999, &["a", "b", "c"]),
            expense("c", 5001, &["a", "c"]),
            expense("a", 7, &["a", "b", "c"]),
        ];

        for step in &steps {
            sheet.apply_expense(step);
            assert!(sheet.is_balanced(), "unbalanced after {:?}", step);
        }

        let payment = PaymentEvent::new(member("c"), member("a"), 1234).unwrap();
        sheet.apply_payment(&payment);
        assert!(sheet.is_balanced());
    }

    #[test]
    fn test_from_entries_prunes_zeros() {
        let sheet = Balances::from_entries([
            (member("a"), 500),
            (member("b"), -500),
            (member("c"), 0),
        ])
        .unwrap();

        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.get(&member("c")), 0);
    }

    #[test]
    fn test_from_entries_rejects_unbalanced() {
        let err = Balances::from_entries([(member("a"), 500), (member("b"), -499)]).unwrap_err();
        assert_eq!(
            err,
            LedgerError::Unbalanced { residual_cents: 1 }
        );
    }

    #[test]
    fn test_iter_is_sorted_by_member() {
        let mut sheet = Balances::new();
        sheet.apply_expense(&expense("zoe", 3000, &["zoe", "amy", "bob"]));

        let order: Vec<&str> = sheet.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(order, vec!["amy", "bob", "zoe"]);
    }
}
