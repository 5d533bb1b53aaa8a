use thiserror::Error;

use crate::domain::{AccountId, Cents};
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid account details: {0}")]
    InvalidAccount(String),

    #[error("Unknown catalog item: {0}")]
    UnknownItem(String),

    #[error("Crediting {amount} to account {account_id} would overflow its balance of {balance}")]
    BalanceOverflow {
        account_id: AccountId,
        balance: Cents,
        amount: Cents,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),

    #[error("Transaction aborted and rolled back: {0}")]
    TransactionAborted(#[source] StorageError),

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),
}

impl LedgerError {
    /// Whether the same call may succeed if repeated. Only failures that are
    /// guaranteed to have left no partial state qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::StorageUnavailable(_) | LedgerError::TransactionAborted(_)
        )
    }
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(_) => LedgerError::StorageUnavailable(err),
            StorageError::Aborted(_) => LedgerError::TransactionAborted(err),
            _ => LedgerError::Storage(err),
        }
    }
}
