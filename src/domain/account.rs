use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

/// One-way state of the first-time bonus for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BonusState {
    Unclaimed,
    /// Terminal. There is no transition back to `Unclaimed`.
    Claimed,
}

impl BonusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusState::Unclaimed => "unclaimed",
            BonusState::Claimed => "claimed",
        }
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self, BonusState::Claimed)
    }

    /// Map the stored `bonus_claimed` flag.
    pub fn from_flag(claimed: bool) -> Self {
        if claimed {
            BonusState::Claimed
        } else {
            BonusState::Unclaimed
        }
    }
}

impl std::fmt::Display for BonusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer account. The balance is owned by the ledger and only ever
/// changed through its conditional writes, so an `Account` value is a
/// snapshot, not a handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub balance_cents: Cents,
    pub bonus: BonusState,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A freshly registered account: zero balance, bonus not yet claimed.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            balance_cents: 0,
            bonus: BonusState::Unclaimed,
            created_at: Utc::now(),
        }
    }
}
