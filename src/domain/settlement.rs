use serde::{Deserialize, Serialize};

use super::{Balances, Cents, LedgerError, MemberId};

/// One step of a settlement plan: `from` pays `to` exactly `amount_cents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementInstruction {
    pub from: MemberId,
    pub to: MemberId,
    pub amount_cents: Cents,
}

/// Reduce a balance sheet to pairwise transfers that zero every member out.
///
/// Greedy matching: repeatedly pair the largest remaining creditor with the
/// largest remaining debtor and move `min(credit, |debt|)` between them.
/// Ties break on member id ascending, so the plan is deterministic for a
/// given sheet. Not guaranteed to be the mathematical minimum number of
/// transfers, but it always terminates in at most `members - 1` steps,
/// every amount is strictly positive, and applying the plan empties the
/// sheet.
///
/// Never mutates its input. Fails if the sheet does not sum to zero, which
/// is a corruption signal rather than a plannable state.
pub fn plan(balances: &Balances) -> Result<Vec<SettlementInstruction>, LedgerError> {
    let residual = balances.residual();
    if residual != 0 {
        return Err(LedgerError::Unbalanced {
            residual_cents: residual,
        });
    }

    let mut creditors: Vec<(MemberId, Cents)> = Vec::new();
    let mut debtors: Vec<(MemberId, Cents)> = Vec::new();
    for (member, cents) in balances.iter() {
        if cents > 0 {
            creditors.push((member.clone(), cents));
        } else if cents < 0 {
            debtors.push((member.clone(), -cents));
        }
    }

    // Largest first; Balances iterates in member-id order, so a stable
    // sort keeps the id-ascending tie-break for free.
    creditors.sort_by(|a, b| b.1.cmp(&a.1));
    debtors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut instructions = Vec::new();
    let (mut ci, mut di) = (0, 0);
    while ci < creditors.len() && di < debtors.len() {
        let transfer = creditors[ci].1.min(debtors[di].1);
        instructions.push(SettlementInstruction {
            from: debtors[di].0.clone(),
            to: creditors[ci].0.clone(),
            amount_cents: transfer,
        });

        creditors[ci].1 -= transfer;
        debtors[di].1 -= transfer;
        if creditors[ci].1 == 0 {
            ci += 1;
        }
        if debtors[di].1 == 0 {
            di += 1;
        }
    }

    // A zero-sum sheet exhausts both sides together.
    debug_assert!(ci == creditors.len() && di == debtors.len());

    Ok(instructions)
}
