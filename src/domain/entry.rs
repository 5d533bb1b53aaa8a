use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents, PurchaseId};

pub type EntryId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// The one-time registration bonus
    Bonus,
    /// A trusted internal credit (refunds, adjustments)
    Credit,
    /// A bare debit with no purchase attached
    Debit,
    /// The debit half of a purchase
    Purchase,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Bonus => "bonus",
            EntryKind::Credit => "credit",
            EntryKind::Debit => "debit",
            EntryKind::Purchase => "purchase",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bonus" => Some(EntryKind::Bonus),
            "credit" => Some(EntryKind::Credit),
            "debit" => Some(EntryKind::Debit),
            "purchase" => Some(EntryKind::Purchase),
            _ => None,
        }
    }

    /// True for kinds that increase the balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryKind::Bonus | EntryKind::Credit)
    }

    /// Signed effect of an entry of this kind on the balance.
    pub fn signed(&self, amount_cents: Cents) -> Cents {
        if self.is_credit() {
            amount_cents
        } else {
            -amount_cents
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Journal line written in the same transaction as the balance change it
/// describes. `amount_cents` is always positive; direction comes from `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub kind: EntryKind,
    pub amount_cents: Cents,
    /// Balance immediately after this entry committed
    pub balance_after: Cents,
    pub purchase_id: Option<PurchaseId>,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        account_id: AccountId,
        kind: EntryKind,
        amount_cents: Cents,
        balance_after: Cents,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount_cents,
            balance_after,
            purchase_id: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn for_purchase(
        purchase_id: PurchaseId,
        account_id: AccountId,
        amount_cents: Cents,
        balance_after: Cents,
    ) -> Self {
        Self {
            purchase_id: Some(purchase_id),
            ..Self::new(account_id, EntryKind::Purchase, amount_cents, balance_after)
        }
    }
}
