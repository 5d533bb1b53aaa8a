use std::collections::HashMap;

use serde::Serialize;

use super::{Account, AccountId, Cents, EntryKind, LedgerEntry};

/// Journal totals for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountTotals {
    pub credited: Cents,
    pub debited: Cents,
    pub bonus_entries: i64,
}

impl AccountTotals {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut totals, entry| {
            if entry.kind.is_credit() {
                totals.credited += entry.amount_cents;
            } else {
                totals.debited += entry.amount_cents;
            }
            if entry.kind == EntryKind::Bonus {
                totals.bonus_entries += 1;
            }
            totals
        })
    }

    /// Balance implied by the journal.
    pub fn net(&self) -> Cents {
        self.credited - self.debited
    }
}

/// Replay a journal into the balance it describes.
pub fn replay_balance(entries: &[LedgerEntry]) -> Cents {
    entries
        .iter()
        .map(|entry| entry.kind.signed(entry.amount_cents))
        .sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IntegrityIssue {
    NegativeBalance {
        account_id: AccountId,
        balance: Cents,
    },
    BalanceMismatch {
        account_id: AccountId,
        stored: Cents,
        journal: Cents,
    },
    Overdraft {
        account_id: AccountId,
        credited: Cents,
        debited: Cents,
    },
    BonusMismatch {
        account_id: AccountId,
        claimed: bool,
        bonus_entries: i64,
    },
    /// Purchase rows with no matching purchase debit in the journal
    OrphanedPurchases { count: i64 },
    /// Purchase debits whose purchase row is missing
    OrphanedPurchaseEntries { count: i64 },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::NegativeBalance {
                account_id,
                balance,
            } => write!(f, "account {} has negative balance {}", account_id, balance),
            IntegrityIssue::BalanceMismatch {
                account_id,
                stored,
                journal,
            } => write!(
                f,
                "account {} stores balance {} but its journal sums to {}",
                account_id, stored, journal
            ),
            IntegrityIssue::Overdraft {
                account_id,
                credited,
                debited,
            } => write!(
                f,
                "account {} was debited {} against only {} credited",
                account_id, debited, credited
            ),
            IntegrityIssue::BonusMismatch {
                account_id,
                claimed,
                bonus_entries,
            } => write!(
                f,
                "account {} has bonus {} with {} bonus entries",
                account_id,
                if *claimed { "claimed" } else { "unclaimed" },
                bonus_entries
            ),
            IntegrityIssue::OrphanedPurchases { count } => {
                write!(f, "{} purchase(s) without a matching debit", count)
            }
            IntegrityIssue::OrphanedPurchaseEntries { count } => {
                write!(f, "{} purchase debit(s) without a purchase record", count)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub account_count: usize,
    pub purchase_count: i64,
    pub entry_count: i64,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Cross-check stored account state against the journal.
pub fn build_integrity_report(
    accounts: &[Account],
    totals: &HashMap<AccountId, AccountTotals>,
    purchase_count: i64,
    entry_count: i64,
    orphaned_purchases: i64,
    orphaned_purchase_entries: i64,
) -> IntegrityReport {
    let mut issues = Vec::new();

    for account in accounts {
        let t = totals.get(&account.id).copied().unwrap_or_default();

        if account.balance_cents < 0 {
            issues.push(IntegrityIssue::NegativeBalance {
                account_id: account.id,
                balance: account.balance_cents,
            });
        }
        if account.balance_cents != t.net() {
            issues.push(IntegrityIssue::BalanceMismatch {
                account_id: account.id,
                stored: account.balance_cents,
                journal: t.net(),
            });
        }
        if t.debited > t.credited {
            issues.push(IntegrityIssue::Overdraft {
                account_id: account.id,
                credited: t.credited,
                debited: t.debited,
            });
        }

        let expected_bonus_entries = if account.bonus.is_claimed() { 1 } else { 0 };
        if t.bonus_entries != expected_bonus_entries {
            issues.push(IntegrityIssue::BonusMismatch {
                account_id: account.id,
                claimed: account.bonus.is_claimed(),
                bonus_entries: t.bonus_entries,
            });
        }
    }

    if orphaned_purchases > 0 {
        issues.push(IntegrityIssue::OrphanedPurchases {
            count: orphaned_purchases,
        });
    }
    if orphaned_purchase_entries > 0 {
        issues.push(IntegrityIssue::OrphanedPurchaseEntries {
            count: orphaned_purchase_entries,
        });
    }

    IntegrityReport {
        account_count: accounts.len(),
        purchase_count,
        entry_count,
        issues,
    }
}
