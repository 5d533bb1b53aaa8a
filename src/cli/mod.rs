use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{with_retry, LedgerError, LedgerService, LedgerSettings};
use crate::config::Settings;
use crate::domain::{format_cents, parse_cents, Account};
use crate::io::Exporter;

/// Shopledger - race-safe balance ledger for a storefront
#[derive(Parser)]
#[command(name = "shopledger")]
#[command(about = "Accounts, one-time bonuses and purchases over an atomic SQLite ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides the configured one)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Claim the one-time bonus for an account
    Bonus {
        /// Account username
        username: String,
    },

    /// Credit an account (refunds, adjustments)
    Credit {
        /// Account username
        username: String,

        /// Amount to credit (e.g., "10.00" or "10")
        amount: String,
    },

    /// Debit an account without a purchase
    Debit {
        /// Account username
        username: String,

        /// Amount to debit (e.g., "9.99")
        amount: String,
    },

    /// Buy a catalog item
    Buy {
        /// Account username
        username: String,

        /// Catalog item id
        item: String,

        /// Storefront location the purchase is made from
        #[arg(short, long)]
        location: Option<String>,
    },

    /// List purchases for an account
    Purchases {
        /// Account username
        username: String,
    },

    /// Show the ledger journal for an account
    History {
        /// Account username
        username: String,
    },

    /// List catalog items and prices
    Catalog,

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: purchases, accounts, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (default: csv for purchases/accounts, json for full)
        #[arg(short, long)]
        format: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Register a new account
    Create {
        /// Username (must be unique)
        username: String,

        /// Email address (must be unique)
        #[arg(short, long)]
        email: String,
    },

    /// Show account details
    Show {
        /// Account username
        username: String,
    },

    /// List all accounts
    List,
}

impl Cli {
    fn load_settings(&self) -> Result<(String, LedgerSettings)> {
        let settings =
            Settings::load(self.config.as_deref()).context("Failed to load configuration")?;
        let ledger = settings
            .ledger_settings()
            .context("Invalid configuration")?;
        let database = self.database.clone().unwrap_or(settings.database);
        Ok((database, ledger))
    }

    pub async fn run(self) -> Result<()> {
        let (database, settings) = self.load_settings()?;

        if matches!(self.command, Commands::Init) {
            LedgerService::init(&database, &settings).await?;
            println!("Database initialized: {}", database);
            return Ok(());
        }

        let service = LedgerService::connect(&database, &settings)
            .await
            .with_context(|| format!("Failed to open database '{}'. Run 'init' first?", database))?;

        match self.command {
            // Handled before connecting
            Commands::Init => {}

            Commands::Account(account_cmd) => {
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Bonus { username } => {
                let account = service.find_account(&username).await?;
                let grant =
                    with_retry("bonus", || service.credit_bonus_once(account.id)).await?;

                if grant.granted {
                    println!(
                        "Bonus of {} granted to {}. New balance: {}",
                        format_cents(service.bonus_amount()),
                        account.username,
                        format_cents(grant.new_balance)
                    );
                } else {
                    println!(
                        "Bonus already claimed by {}. Balance: {}",
                        account.username,
                        format_cents(grant.new_balance)
                    );
                }
            }

            Commands::Credit { username, amount } => {
                let amount_cents = parse_amount(&amount)?;
                let account = service.find_account(&username).await?;
                let balance =
                    with_retry("credit", || service.credit(account.id, amount_cents)).await?;
                println!(
                    "Credited {} to {}. New balance: {}",
                    format_cents(amount_cents),
                    account.username,
                    format_cents(balance)
                );
            }

            Commands::Debit { username, amount } => {
                let amount_cents = parse_amount(&amount)?;
                let account = service.find_account(&username).await?;
                let result = with_retry("debit", || service.debit(account.id, amount_cents)).await;

                match result {
                    Ok(balance) => println!(
                        "Debited {} from {}. New balance: {}",
                        format_cents(amount_cents),
                        account.username,
                        format_cents(balance)
                    ),
                    Err(LedgerError::InsufficientFunds {
                        balance, required, ..
                    }) => {
                        anyhow::bail!(
                            "Insufficient balance: need {} but only have {}",
                            format_cents(required),
                            format_cents(balance)
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            Commands::Buy {
                username,
                item,
                location,
            } => {
                let account = service.find_account(&username).await?;
                let result = with_retry("purchase", || {
                    service.purchase(account.id, &item, location.clone())
                })
                .await;

                match result {
                    Ok(receipt) => {
                        println!(
                            "Purchased {} for {}. Remaining balance: {}",
                            receipt.record.item_id,
                            format_cents(receipt.record.price_cents),
                            format_cents(receipt.new_balance)
                        );
                        println!("Purchase ID: {}", receipt.record.id);
                    }
                    Err(LedgerError::InsufficientFunds {
                        balance, required, ..
                    }) => {
                        anyhow::bail!(
                            "Insufficient balance! You need {} but only have {}.",
                            format_cents(required),
                            format_cents(balance)
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            Commands::Purchases { username } => {
                let account = service.find_account(&username).await?;
                run_purchases_command(&service, &account).await?;
            }

            Commands::History { username } => {
                let account = service.find_account(&username).await?;
                run_history_command(&service, &account).await?;
            }

            Commands::Catalog => {
                println!("{:<20} {:>10}", "ITEM", "PRICE");
                println!("{}", "-".repeat(31));
                for (item_id, price) in service.catalog().items() {
                    println!("{:<20} {:>10}", item_id, format_cents(price));
                }
            }

            Commands::Check => {
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
                format,
            } => {
                run_export_command(&service, &export_type, output.as_deref(), format.as_deref())
                    .await?;
            }
        }

        Ok(())
    }
}

fn parse_amount(amount: &str) -> Result<i64> {
    parse_cents(amount)
        .with_context(|| format!("Invalid amount '{}'. Use '10.00' or '10'", amount))
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create { username, email } => {
            let account = service.open_account(username, email).await?;
            println!("Created account: {} ({})", account.username, account.id);
        }

        AccountCommands::Show { username } => {
            let statement = service
                .statement(service.find_account(&username).await?.id)
                .await?;
            let account = &statement.account;

            println!("Account: {}", account.username);
            println!("  ID:       {}", account.id);
            println!("  Email:    {}", account.email);
            println!("  Bonus:    {}", account.bonus);
            println!(
                "  Created:  {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Balance:  {}", format_cents(account.balance_cents));
            println!(
                "  Credited: {} / Debited: {} ({} entries)",
                format_cents(statement.totals.credited),
                format_cents(statement.totals.debited),
                statement.entries.len()
            );
        }

        AccountCommands::List => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<20} {:>12} {:<10}", "USERNAME", "BALANCE", "BONUS");
                println!("{}", "-".repeat(44));
                for account in accounts {
                    println!(
                        "{:<20} {:>12} {:<10}",
                        account.username,
                        format_cents(account.balance_cents),
                        account.bonus.as_str()
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_purchases_command(service: &LedgerService, account: &Account) -> Result<()> {
    let purchases = service.list_purchases(account.id).await?;
    if purchases.is_empty() {
        println!("No purchases for {}.", account.username);
        return Ok(());
    }

    println!(
        "{:<20} {:<20} {:>10} {:<12}",
        "DATE", "ITEM", "PRICE", "LOCATION"
    );
    println!("{}", "-".repeat(65));
    for purchase in purchases {
        println!(
            "{:<20} {:<20} {:>10} {:<12}",
            purchase.purchased_at.format("%Y-%m-%d %H:%M:%S"),
            purchase.item_id,
            format_cents(purchase.price_cents),
            purchase.location.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn run_history_command(service: &LedgerService, account: &Account) -> Result<()> {
    let entries = service.list_entries(account.id).await?;
    if entries.is_empty() {
        println!("No ledger entries for {}.", account.username);
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:>12} {:>12}",
        "DATE", "KIND", "AMOUNT", "BALANCE"
    );
    println!("{}", "-".repeat(57));
    for entry in entries {
        println!(
            "{:<20} {:<10} {:>12} {:>12}",
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            entry.kind.as_str(),
            format_cents(entry.kind.signed(entry.amount_cents)),
            format_cents(entry.balance_after)
        );
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    let report = service.check_integrity().await?;

    println!("Accounts:  {}", report.account_count);
    println!("Purchases: {}", report.purchase_count);
    println!("Entries:   {}", report.entry_count);

    if report.is_ok() {
        println!("Ledger integrity: OK");
        Ok(())
    } else {
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity: {} issue(s) found", report.issues.len())
    }
}

/// What `export` writes, resolved before any output file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportTarget {
    PurchasesCsv,
    PurchasesJson,
    AccountsCsv,
    AccountsJson,
    FullJson,
}

impl ExportTarget {
    fn resolve(export_type: &str, format: Option<&str>) -> Result<Self> {
        let default_format = if export_type == "full" { "json" } else { "csv" };
        match (export_type, format.unwrap_or(default_format)) {
            ("purchases", "csv") => Ok(ExportTarget::PurchasesCsv),
            ("purchases", "json") => Ok(ExportTarget::PurchasesJson),
            ("accounts", "csv") => Ok(ExportTarget::AccountsCsv),
            ("accounts", "json") => Ok(ExportTarget::AccountsJson),
            ("full", "json") => Ok(ExportTarget::FullJson),
            (kind, fmt) => anyhow::bail!(
                "Unsupported export '{}' as '{}'. Use: purchases|accounts (csv, json), full (json)",
                kind,
                fmt
            ),
        }
    }
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
    format: Option<&str>,
) -> Result<()> {
    let target = ExportTarget::resolve(export_type, format)?;

    let writer: Box<dyn std::io::Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file '{}'", path))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let exporter = Exporter::new(service);

    let count = match target {
        ExportTarget::PurchasesCsv => exporter.export_purchases_csv(writer).await?,
        ExportTarget::PurchasesJson => exporter.export_purchases_json(writer).await?,
        ExportTarget::AccountsCsv => exporter.export_accounts_csv(writer).await?,
        ExportTarget::AccountsJson => exporter.export_accounts_json(writer).await?,
        ExportTarget::FullJson => {
            let snapshot = exporter.export_full_json(writer).await?;
            snapshot.accounts.len() + snapshot.purchases.len() + snapshot.entries.len()
        }
    };

    if let Some(path) = output {
        eprintln!("Exported {} record(s) to {}", count, path);
    }
    Ok(())
}
