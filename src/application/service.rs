use tracing::{debug, info};

use crate::domain::{
    build_integrity_report, Account, AccountId, AccountTotals, Catalog, Cents, IntegrityReport,
    LedgerEntry, PurchaseRecord,
};
use crate::storage::{LedgerContents, Repository, StorageError, StoreOptions, WriteOutcome};

use super::LedgerError;

/// Default first-time bonus: $10.00
pub const DEFAULT_BONUS_CENTS: Cents = 1000;

/// Settings the ledger needs beyond a database location.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub bonus_cents: Cents,
    pub catalog: Catalog,
    pub store: StoreOptions,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            bonus_cents: DEFAULT_BONUS_CENTS,
            catalog: Catalog::default(),
            store: StoreOptions::default(),
        }
    }
}

/// Application service owning every balance-affecting operation.
///
/// The service keeps no per-account state of its own. All coordination
/// between concurrent callers happens in the store's conditional writes, so
/// any number of tasks (or processes sharing the database) may call it at
/// once.
#[derive(Clone)]
pub struct LedgerService {
    repo: Repository,
    catalog: Catalog,
    bonus_cents: Cents,
}

/// Outcome of a bonus claim. A repeat claim is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusGrant {
    pub granted: bool,
    pub new_balance: Cents,
}

/// A committed purchase together with the balance it left behind.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub record: PurchaseRecord,
    pub new_balance: Cents,
}

/// Account snapshot plus its full journal.
pub struct AccountStatement {
    pub account: Account,
    pub entries: Vec<LedgerEntry>,
    pub totals: AccountTotals,
}

impl LedgerService {
    /// Create a new ledger service over an existing repository.
    pub fn new(repo: Repository, settings: &LedgerSettings) -> Result<Self, LedgerError> {
        if settings.bonus_cents <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "Bonus must be positive, got {}",
                settings.bonus_cents
            )));
        }
        Ok(Self {
            repo,
            catalog: settings.catalog.clone(),
            bonus_cents: settings.bonus_cents,
        })
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, settings: &LedgerSettings) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::init(&db_url, &settings.store).await?;
        info!(database = database_path, "Ledger database initialized");
        Self::new(repo, settings)
    }

    /// Connect to an existing database.
    pub async fn connect(
        database_path: &str,
        settings: &LedgerSettings,
    ) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url, &settings.store).await?;
        Self::new(repo, settings)
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn bonus_amount(&self) -> Cents {
        self.bonus_cents
    }

    // ========================
    // Account operations
    // ========================

    /// Register a new account with zero balance and an unclaimed bonus.
    pub async fn open_account(
        &self,
        username: String,
        email: String,
    ) -> Result<Account, LedgerError> {
        let username = username.trim().to_string();
        let email = email.trim().to_string();
        if username.is_empty() || email.is_empty() {
            return Err(LedgerError::InvalidAccount(
                "Username and email are required".to_string(),
            ));
        }

        if self
            .repo
            .find_registration_conflict(&username, &email)
            .await?
            .is_some()
        {
            return Err(LedgerError::AccountAlreadyExists(username));
        }

        let account = Account::new(username, email);
        match self.repo.save_account(&account).await {
            Ok(()) => {}
            // Lost a registration race to a concurrent caller
            Err(StorageError::UniqueViolation(_)) => {
                return Err(LedgerError::AccountAlreadyExists(account.username));
            }
            Err(e) => return Err(e.into()),
        }

        info!(account_id = %account.id, username = %account.username, "Account opened");
        Ok(account)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Get an account by username.
    pub async fn find_account(&self, username: &str) -> Result<Account, LedgerError> {
        self.repo
            .get_account_by_username(username)
            .await?
            .ok_or_else(|| LedgerError::NotFound(username.to_string()))
    }

    /// List all accounts.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.repo.list_accounts().await?)
    }

    // ========================
    // Balance operations
    // ========================

    /// Grant the first-time bonus if it has not been granted yet.
    ///
    /// Concurrent calls for the same account yield exactly one
    /// `granted = true`.
    pub async fn credit_bonus_once(&self, id: AccountId) -> Result<BonusGrant, LedgerError> {
        match self.repo.claim_bonus(id, self.bonus_cents).await? {
            WriteOutcome::Applied { balance } => {
                info!(account_id = %id, bonus = self.bonus_cents, balance, "Bonus granted");
                Ok(BonusGrant {
                    granted: true,
                    new_balance: balance,
                })
            }
            WriteOutcome::Rejected { balance } => {
                debug!(account_id = %id, balance, "Bonus already claimed");
                Ok(BonusGrant {
                    granted: false,
                    new_balance: balance,
                })
            }
            WriteOutcome::Overflow { balance } => Err(LedgerError::BalanceOverflow {
                account_id: id,
                balance,
                amount: self.bonus_cents,
            }),
            WriteOutcome::MissingAccount => Err(LedgerError::NotFound(id.to_string())),
        }
    }

    /// Credit an account unconditionally. For trusted internal flows such as
    /// refunds; returns the new balance.
    pub async fn credit(&self, id: AccountId, amount: Cents) -> Result<Cents, LedgerError> {
        validate_amount(amount)?;

        match self.repo.credit(id, amount).await? {
            WriteOutcome::Applied { balance } => {
                info!(account_id = %id, amount, balance, "Credit committed");
                Ok(balance)
            }
            WriteOutcome::Overflow { balance } | WriteOutcome::Rejected { balance } => {
                Err(LedgerError::BalanceOverflow {
                    account_id: id,
                    balance,
                    amount,
                })
            }
            WriteOutcome::MissingAccount => Err(LedgerError::NotFound(id.to_string())),
        }
    }

    /// Debit an account if and only if it holds at least `amount`; returns
    /// the new balance. On `InsufficientFunds` the balance is unchanged.
    pub async fn debit(&self, id: AccountId, amount: Cents) -> Result<Cents, LedgerError> {
        validate_amount(amount)?;

        let outcome = self.repo.debit(id, amount).await?;
        let balance = settle_debit(id, amount, outcome)?;
        info!(account_id = %id, amount, balance, "Debit committed");
        Ok(balance)
    }

    /// Debit `price` and record the purchase as a single unit.
    pub async fn record_purchase(
        &self,
        id: AccountId,
        item_id: &str,
        price: Cents,
    ) -> Result<PurchaseReceipt, LedgerError> {
        self.commit_purchase(PurchaseRecord::new(id, item_id, price))
            .await
    }

    /// Buy a catalog item at its listed price.
    pub async fn purchase(
        &self,
        id: AccountId,
        item_id: &str,
        location: Option<String>,
    ) -> Result<PurchaseReceipt, LedgerError> {
        let price = self
            .catalog
            .price_of(item_id)
            .ok_or_else(|| LedgerError::UnknownItem(item_id.to_string()))?;

        let mut record = PurchaseRecord::new(id, item_id, price);
        if let Some(location) = location {
            record = record.with_location(location);
        }
        self.commit_purchase(record).await
    }

    async fn commit_purchase(
        &self,
        record: PurchaseRecord,
    ) -> Result<PurchaseReceipt, LedgerError> {
        if record.item_id.trim().is_empty() {
            return Err(LedgerError::UnknownItem(record.item_id));
        }
        validate_amount(record.price_cents)?;

        let outcome = self.repo.debit_and_record(&record).await?;
        let balance = settle_debit(record.account_id, record.price_cents, outcome)?;
        info!(
            account_id = %record.account_id,
            purchase_id = %record.id,
            item = %record.item_id,
            price = record.price_cents,
            balance,
            "Purchase committed"
        );

        Ok(PurchaseReceipt {
            record,
            new_balance: balance,
        })
    }

    // ========================
    // History & integrity
    // ========================

    /// Purchases for an account, oldest first.
    pub async fn list_purchases(&self, id: AccountId) -> Result<Vec<PurchaseRecord>, LedgerError> {
        self.get_account(id).await?;
        Ok(self.repo.list_purchases_for_account(id).await?)
    }

    /// Every purchase in the ledger, oldest first.
    pub async fn list_all_purchases(&self) -> Result<Vec<PurchaseRecord>, LedgerError> {
        Ok(self.repo.list_purchases().await?)
    }

    /// Journal entries for an account in commit order.
    pub async fn list_entries(&self, id: AccountId) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.get_account(id).await?;
        Ok(self.repo.list_entries_for_account(id).await?)
    }

    /// Account snapshot with its journal and totals.
    pub async fn statement(&self, id: AccountId) -> Result<AccountStatement, LedgerError> {
        let account = self.get_account(id).await?;
        let entries = self.repo.list_entries_for_account(id).await?;
        let totals = AccountTotals::from_entries(&entries);
        Ok(AccountStatement {
            account,
            entries,
            totals,
        })
    }

    /// Accounts, purchases and the full journal as of one moment.
    pub async fn contents(&self) -> Result<LedgerContents, LedgerError> {
        Ok(self.repo.read_contents().await?)
    }

    /// Check ledger integrity and return a report.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        let stats = self.repo.get_integrity_stats().await?;
        let accounts = self.repo.list_accounts().await?;
        let totals = self.repo.journal_totals().await?;

        let report = build_integrity_report(
            &accounts,
            &totals,
            stats.purchase_count,
            stats.entry_count,
            stats.orphaned_purchases,
            stats.orphaned_purchase_entries,
        );

        if !report.is_ok() {
            tracing::warn!(issues = report.issues.len(), "Ledger integrity check failed");
        }
        Ok(report)
    }
}

fn validate_amount(amount: Cents) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(format!(
            "Amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

fn settle_debit(id: AccountId, amount: Cents, outcome: WriteOutcome) -> Result<Cents, LedgerError> {
    match outcome {
        WriteOutcome::Applied { balance } => Ok(balance),
        WriteOutcome::Rejected { balance } | WriteOutcome::Overflow { balance } => {
            debug!(account_id = %id, amount, balance, "Debit rejected: insufficient funds");
            Err(LedgerError::InsufficientFunds {
                account_id: id,
                balance,
                required: amount,
            })
        }
        WriteOutcome::MissingAccount => Err(LedgerError::NotFound(id.to_string())),
    }
}
