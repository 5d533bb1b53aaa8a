use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, AccountTotals, BonusState, Cents, EntryKind, LedgerEntry, PurchaseRecord,
};

use super::{Result, StorageError, MIGRATION_001_INITIAL};

const ACCOUNT_COLUMNS: &str = "id, username, email, balance_cents, bonus_claimed, created_at";
const PURCHASE_COLUMNS: &str = "id, account_id, item_id, price_cents, location, purchased_at";
const ENTRY_COLUMNS: &str =
    "id, account_id, kind, amount_cents, balance_after, purchase_id, recorded_at";

/// Connection settings for the SQLite store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a writer waits for the database lock before giving up
    pub busy_timeout: Duration,
    /// How long a caller waits for a pooled connection
    pub acquire_timeout: Duration,
    pub max_connections: u32,
    pub create_if_missing: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(10),
            max_connections: 8,
            create_if_missing: false,
        }
    }
}

/// Result of a conditional balance write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The guarded UPDATE matched and committed.
    Applied { balance: Cents },
    /// The account exists but the guard did not hold; nothing was written.
    Rejected { balance: Cents },
    /// The write would push the balance past `Cents::MAX`; nothing was written.
    Overflow { balance: Cents },
    MissingAccount,
}

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub purchase_count: i64,
    pub entry_count: i64,
    pub orphaned_purchases: i64,
    pub orphaned_purchase_entries: i64,
}

/// Every row of the ledger, read at a single point in time.
#[derive(Debug, Clone)]
pub struct LedgerContents {
    pub accounts: Vec<Account>,
    pub purchases: Vec<PurchaseRecord>,
    /// Journal entries across all accounts in commit order
    pub entries: Vec<LedgerEntry>,
}

/// Repository for persisting accounts, purchases and the ledger journal.
///
/// Every balance change is a single `UPDATE ... WHERE <guard> RETURNING`
/// statement, run in the same transaction as the journal insert that
/// records it. No balance is ever read first and written back.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database.
    pub async fn connect(database_url: &str, options: &StoreOptions) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Database)?
            .create_if_missing(options.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(options.busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect_options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str, options: &StoreOptions) -> Result<Self> {
        let options = StoreOptions {
            create_if_missing: true,
            ..options.clone()
        };
        let repo = Self::connect(database_url, &options).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Underlying pool, for maintenance tooling.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================
    // Account operations
    // ========================

    /// Save a newly registered account.
    pub async fn save_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, email, balance_cents, bonus_claimed, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.username)
        .bind(&account.email)
        .bind(account.balance_cents)
        .bind(account.bonus.is_claimed())
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let query = format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Get an account by username.
    pub async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {} FROM accounts WHERE username = ?", ACCOUNT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Find an account that already uses this username or email.
    pub async fn find_registration_conflict(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>> {
        let query = format!(
            "SELECT {} FROM accounts WHERE username = ? OR email = ? LIMIT 1",
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List all accounts by username.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let query = format!("SELECT {} FROM accounts ORDER BY username", ACCOUNT_COLUMNS);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_account).collect()
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: parse_uuid("accounts.id", &id_str)?,
            username: row.get("username"),
            email: row.get("email"),
            balance_cents: row.get("balance_cents"),
            bonus: BonusState::from_flag(row.get::<i64, _>("bonus_claimed") != 0),
            created_at: parse_timestamp("accounts.created_at", &created_at_str)?,
        })
    }

    // ========================
    // Balance operations
    // ========================

    /// Grant the one-time bonus.
    ///
    /// The claim flag and the balance move together in one UPDATE guarded by
    /// `bonus_claimed = 0`, so concurrent claimers race on the row itself and
    /// exactly one of them matches.
    pub async fn claim_bonus(&self, id: AccountId, bonus: Cents) -> Result<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?, bonus_claimed = 1
            WHERE id = ? AND bonus_claimed = 0 AND balance_cents <= ?
            RETURNING balance_cents
            "#,
        )
        .bind(bonus)
        .bind(id.to_string())
        .bind(Cents::MAX.saturating_sub(bonus))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let outcome = match Self::current_state(&mut tx, id).await? {
                None => WriteOutcome::MissingAccount,
                Some((balance, BonusState::Claimed)) => WriteOutcome::Rejected { balance },
                Some((balance, BonusState::Unclaimed)) => WriteOutcome::Overflow { balance },
            };
            tx.rollback().await?;
            return Ok(outcome);
        };

        let balance: Cents = row.get("balance_cents");
        let entry = LedgerEntry::new(id, EntryKind::Bonus, bonus, balance);
        Self::insert_entry(&mut tx, &entry).await?;
        tx.commit()
            .await
            .map_err(StorageError::classify_in_transaction)?;

        Ok(WriteOutcome::Applied { balance })
    }

    /// Unconditional credit, guarded only against overflow.
    pub async fn credit(&self, id: AccountId, amount: Cents) -> Result<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?
            WHERE id = ? AND balance_cents <= ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount)
        .bind(id.to_string())
        .bind(Cents::MAX.saturating_sub(amount))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let outcome = match Self::current_state(&mut tx, id).await? {
                None => WriteOutcome::MissingAccount,
                Some((balance, _)) => WriteOutcome::Overflow { balance },
            };
            tx.rollback().await?;
            return Ok(outcome);
        };

        let balance: Cents = row.get("balance_cents");
        let entry = LedgerEntry::new(id, EntryKind::Credit, amount, balance);
        Self::insert_entry(&mut tx, &entry).await?;
        tx.commit()
            .await
            .map_err(StorageError::classify_in_transaction)?;

        Ok(WriteOutcome::Applied { balance })
    }

    /// Debit guarded by `balance_cents >= amount`.
    pub async fn debit(&self, id: AccountId, amount: Cents) -> Result<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(balance) = Self::guarded_debit(&mut tx, id, amount).await? else {
            let outcome = Self::rejected_debit(&mut tx, id).await?;
            tx.rollback().await?;
            return Ok(outcome);
        };

        let entry = LedgerEntry::new(id, EntryKind::Debit, amount, balance);
        Self::insert_entry(&mut tx, &entry).await?;
        tx.commit()
            .await
            .map_err(StorageError::classify_in_transaction)?;

        Ok(WriteOutcome::Applied { balance })
    }

    /// Debit the purchase price and store the purchase as one unit.
    ///
    /// If anything fails after the debit, the transaction is dropped
    /// uncommitted and SQLite rolls the debit back with it.
    pub async fn debit_and_record(&self, purchase: &PurchaseRecord) -> Result<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        let debited = Self::guarded_debit(&mut tx, purchase.account_id, purchase.price_cents).await?;
        let Some(balance) = debited else {
            let outcome = Self::rejected_debit(&mut tx, purchase.account_id).await?;
            tx.rollback().await?;
            return Ok(outcome);
        };

        sqlx::query(
            r#"
            INSERT INTO purchases (id, account_id, item_id, price_cents, location, purchased_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(purchase.id.to_string())
        .bind(purchase.account_id.to_string())
        .bind(&purchase.item_id)
        .bind(purchase.price_cents)
        .bind(&purchase.location)
        .bind(purchase.purchased_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(StorageError::classify_in_transaction)?;

        let entry = LedgerEntry::for_purchase(
            purchase.id,
            purchase.account_id,
            purchase.price_cents,
            balance,
        );
        Self::insert_entry(&mut tx, &entry).await?;
        tx.commit()
            .await
            .map_err(StorageError::classify_in_transaction)?;

        Ok(WriteOutcome::Applied { balance })
    }

    async fn guarded_debit(
        tx: &mut Transaction<'static, Sqlite>,
        id: AccountId,
        amount: Cents,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents - ?
            WHERE id = ? AND balance_cents >= ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount)
        .bind(id.to_string())
        .bind(amount)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(|row| row.get("balance_cents")))
    }

    async fn rejected_debit(
        tx: &mut Transaction<'static, Sqlite>,
        id: AccountId,
    ) -> Result<WriteOutcome> {
        Ok(match Self::current_state(tx, id).await? {
            None => WriteOutcome::MissingAccount,
            Some((balance, _)) => WriteOutcome::Rejected { balance },
        })
    }

    /// Read balance and bonus state inside the transaction that just failed
    /// its guard. Used only to explain the miss, never to decide a write.
    async fn current_state(
        tx: &mut Transaction<'static, Sqlite>,
        id: AccountId,
    ) -> Result<Option<(Cents, BonusState)>> {
        let row = sqlx::query("SELECT balance_cents, bonus_claimed FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await?;

        Ok(row.map(|row| {
            (
                row.get("balance_cents"),
                BonusState::from_flag(row.get::<i64, _>("bonus_claimed") != 0),
            )
        }))
    }

    async fn insert_entry(tx: &mut Transaction<'static, Sqlite>, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, account_id, kind, amount_cents, balance_after, purchase_id, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.account_id.to_string())
        .bind(entry.kind.as_str())
        .bind(entry.amount_cents)
        .bind(entry.balance_after)
        .bind(entry.purchase_id.map(|id| id.to_string()))
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(StorageError::classify_in_transaction)?;
        Ok(())
    }

    // ========================
    // Purchase & journal queries
    // ========================

    /// List purchases for an account, oldest first.
    pub async fn list_purchases_for_account(&self, id: AccountId) -> Result<Vec<PurchaseRecord>> {
        let query = format!(
            "SELECT {} FROM purchases WHERE account_id = ? ORDER BY purchased_at, rowid",
            PURCHASE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_purchase).collect()
    }

    /// List every purchase, oldest first.
    pub async fn list_purchases(&self) -> Result<Vec<PurchaseRecord>> {
        let query = format!(
            "SELECT {} FROM purchases ORDER BY purchased_at, rowid",
            PURCHASE_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_purchase).collect()
    }

    /// List journal entries for an account in commit order.
    pub async fn list_entries_for_account(&self, id: AccountId) -> Result<Vec<LedgerEntry>> {
        let query = format!(
            "SELECT {} FROM ledger_entries WHERE account_id = ? ORDER BY seq",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Read accounts, purchases and the whole journal from one read
    /// transaction, so all three describe the same committed state.
    pub async fn read_contents(&self) -> Result<LedgerContents> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {} FROM accounts ORDER BY username", ACCOUNT_COLUMNS);
        let account_rows = sqlx::query(&query).fetch_all(&mut *tx).await?;

        let query = format!(
            "SELECT {} FROM purchases ORDER BY purchased_at, rowid",
            PURCHASE_COLUMNS
        );
        let purchase_rows = sqlx::query(&query).fetch_all(&mut *tx).await?;

        let query = format!("SELECT {} FROM ledger_entries ORDER BY seq", ENTRY_COLUMNS);
        let entry_rows = sqlx::query(&query).fetch_all(&mut *tx).await?;

        tx.rollback().await?;

        Ok(LedgerContents {
            accounts: account_rows
                .iter()
                .map(Self::row_to_account)
                .collect::<Result<_>>()?,
            purchases: purchase_rows
                .iter()
                .map(Self::row_to_purchase)
                .collect::<Result<_>>()?,
            entries: entry_rows
                .iter()
                .map(Self::row_to_entry)
                .collect::<Result<_>>()?,
        })
    }

    /// Journal totals per account, computed in SQL.
    pub async fn journal_totals(&self) -> Result<HashMap<AccountId, AccountTotals>> {
        let rows = sqlx::query(
            r#"
            SELECT
                account_id,
                COALESCE(SUM(CASE WHEN kind IN ('bonus', 'credit') THEN amount_cents ELSE 0 END), 0) AS credited,
                COALESCE(SUM(CASE WHEN kind IN ('debit', 'purchase') THEN amount_cents ELSE 0 END), 0) AS debited,
                COALESCE(SUM(CASE WHEN kind = 'bonus' THEN 1 ELSE 0 END), 0) AS bonus_entries
            FROM ledger_entries
            GROUP BY account_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut totals = HashMap::new();
        for row in rows {
            let account_id_str: String = row.get("account_id");
            totals.insert(
                parse_uuid("ledger_entries.account_id", &account_id_str)?,
                AccountTotals {
                    credited: row.get("credited"),
                    debited: row.get("debited"),
                    bonus_entries: row.get("bonus_entries"),
                },
            );
        }
        Ok(totals)
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let purchase_count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM purchases")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let entry_count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM ledger_entries")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        // A purchase must have exactly one purchase debit with the same price
        let orphaned_purchases: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM purchases p
            WHERE NOT EXISTS (
                SELECT 1 FROM ledger_entries e
                WHERE e.purchase_id = p.id
                  AND e.kind = 'purchase'
                  AND e.account_id = p.account_id
                  AND e.amount_cents = p.price_cents
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let orphaned_purchase_entries: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM ledger_entries e
            WHERE e.kind = 'purchase'
              AND (e.purchase_id IS NULL
                   OR NOT EXISTS (SELECT 1 FROM purchases p WHERE p.id = e.purchase_id))
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(IntegrityStats {
            purchase_count,
            entry_count,
            orphaned_purchases,
            orphaned_purchase_entries,
        })
    }

    fn row_to_purchase(row: &SqliteRow) -> Result<PurchaseRecord> {
        let id_str: String = row.get("id");
        let account_id_str: String = row.get("account_id");
        let purchased_at_str: String = row.get("purchased_at");

        Ok(PurchaseRecord {
            id: parse_uuid("purchases.id", &id_str)?,
            account_id: parse_uuid("purchases.account_id", &account_id_str)?,
            item_id: row.get("item_id"),
            price_cents: row.get("price_cents"),
            location: row.get("location"),
            purchased_at: parse_timestamp("purchases.purchased_at", &purchased_at_str)?,
        })
    }

    fn row_to_entry(row: &SqliteRow) -> Result<LedgerEntry> {
        let id_str: String = row.get("id");
        let account_id_str: String = row.get("account_id");
        let kind_str: String = row.get("kind");
        let purchase_id_str: Option<String> = row.get("purchase_id");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(LedgerEntry {
            id: parse_uuid("ledger_entries.id", &id_str)?,
            account_id: parse_uuid("ledger_entries.account_id", &account_id_str)?,
            kind: EntryKind::from_str(&kind_str)
                .ok_or_else(|| StorageError::corrupt("ledger_entries.kind", kind_str.clone()))?,
            amount_cents: row.get("amount_cents"),
            balance_after: row.get("balance_after"),
            purchase_id: purchase_id_str
                .map(|s| parse_uuid("ledger_entries.purchase_id", &s))
                .transpose()?,
            recorded_at: parse_timestamp("ledger_entries.recorded_at", &recorded_at_str)?,
        })
    }
}

fn parse_uuid(column: &'static str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| StorageError::corrupt(column, value))
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::corrupt(column, value))
}
