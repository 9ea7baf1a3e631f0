use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, GroupId, LedgerError, MemberId};

pub type PaymentId = Uuid;

/// A direct settlement: `payer` handed `amount_cents` to `payee`, inside or
/// outside the app. Sign-agnostic; whether the payer actually owed the
/// payee is the caller's policy, not the ledger's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    payer: MemberId,
    payee: MemberId,
    amount_cents: Cents,
}

impl PaymentEvent {
    pub fn new(payer: MemberId, payee: MemberId, amount_cents: Cents) -> Result<Self, LedgerError> {
        if amount_cents <= 0 {
            return Err(LedgerError::NonPositiveAmount { amount_cents });
        }
        Ok(Self {
            payer,
            payee,
            amount_cents,
        })
    }

    pub fn payer(&self) -> &MemberId {
        &self.payer
    }

    pub fn payee(&self) -> &MemberId {
        &self.payee
    }

    pub fn amount_cents(&self) -> Cents {
        self.amount_cents
    }
}

/// A persisted payment record. When the money moved through an external
/// gateway, `external_ref` carries the confirmed order id; the checkout
/// flow itself happens entirely outside this crate and we only ever see
/// the already-verified result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub group_id: GroupId,
    pub event: PaymentEvent,
    pub note: Option<String>,
    pub external_ref: Option<String>,
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(group_id: GroupId, event: PaymentEvent, paid_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            event,
            note: None,
            external_ref: None,
            paid_at,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(s: &str) -> MemberId {
        MemberId::new(s).unwrap()
    }

    #[test]
    fn test_payment_rejects_non_positive_amount() {
        let err = PaymentEvent::new(member("b"), member("a"), 0).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount { .. }));

        let err = PaymentEvent::new(member("b"), member("a"), -500).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount { .. }));
    }

    #[test]
    fn test_payment_record_builders() {
        let event = PaymentEvent::new(member("b"), member("a"), 5000).unwrap();
        let payment = Payment::new(Uuid::new_v4(), event, Utc::now())
            .with_note("paid back after the trip")
            .with_external_ref("order_123");

        assert_eq!(payment.note.as_deref(), Some("paid back after the trip"));
        assert_eq!(payment.external_ref.as_deref(), Some("order_123"));
    }
}
