use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// SQLite primary result codes that mean "try again later".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be reached or was locked past the busy timeout.
    /// Nothing was written.
    #[error("Storage unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    /// A multi-statement transaction failed part-way and was rolled back.
    #[error("Transaction rolled back: {0}")]
    Aborted(#[source] sqlx::Error),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(#[source] sqlx::Error),

    #[error("Invalid stored value in {column}: {value}")]
    Corrupt { column: &'static str, value: String },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StorageError {
    /// Classify an error raised by a single statement.
    pub fn classify(err: sqlx::Error) -> Self {
        if is_transient(&err) {
            return StorageError::Unavailable(err);
        }
        let unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
        if unique {
            StorageError::UniqueViolation(err)
        } else {
            StorageError::Database(err)
        }
    }

    /// Classify an error raised inside a transaction that had already
    /// applied some of its writes. Transient errors stay `Unavailable`;
    /// anything else means the unit was abandoned.
    pub fn classify_in_transaction(err: sqlx::Error) -> Self {
        if is_transient(&err) {
            StorageError::Unavailable(err)
        } else {
            StorageError::Aborted(err)
        }
    }

    pub fn corrupt(column: &'static str, value: impl Into<String>) -> Self {
        StorageError::Corrupt {
            column,
            value: value.into(),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::classify(err)
    }
}

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            // Extended codes carry the primary code in the low byte
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        let err = StorageError::classify(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StorageError::Unavailable(_)));

        let err = StorageError::classify_in_transaction(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[test]
    fn test_row_not_found_is_not_transient() {
        let err = StorageError::classify(sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::Database(_)));

        let err = StorageError::classify_in_transaction(sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::Aborted(_)));
    }
}
