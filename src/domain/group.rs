use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MemberId;

pub type GroupId = Uuid;

/// Currency codes accepted at group creation. Validation happens at the
/// application boundary; the ledger itself never inspects the code.
pub const SUPPORTED_CURRENCIES: &[&str] = &["EUR", "USD", "INR"];

pub fn currency_supported(code: &str) -> bool {
    SUPPORTED_CURRENCIES.contains(&code)
}

/// A group of people sharing expenses. The member set is the referential
/// universe for every expense and payment recorded against the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub currency: String,
    pub description: Option<String>,
    pub members: BTreeSet<MemberId>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String, currency: String, members: BTreeSet<MemberId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            currency,
            description: None,
            members,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_member(&self, member: &MemberId) -> bool {
        self.members.contains(member)
    }
}
