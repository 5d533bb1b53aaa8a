use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Account, LedgerEntry, PurchaseRecord};

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub purchases: Vec<PurchaseRecord>,
    pub entries: Vec<LedgerEntry>,
}

/// Exporter for converting ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export purchases to CSV, with the buyer's username resolved
    pub async fn export_purchases_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let purchases = self.service.list_all_purchases().await?;
        let usernames: std::collections::HashMap<_, _> = self
            .service
            .list_accounts()
            .await?
            .into_iter()
            .map(|a| (a.id, a.username))
            .collect();

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record([
            "id",
            "purchased_at",
            "account",
            "item_id",
            "price_cents",
            "location",
        ])?;

        for purchase in &purchases {
            csv_writer.write_record([
                purchase.id.to_string(),
                purchase.purchased_at.to_rfc3339(),
                usernames
                    .get(&purchase.account_id)
                    .cloned()
                    .unwrap_or_else(|| purchase.account_id.to_string()),
                purchase.item_id.clone(),
                purchase.price_cents.to_string(),
                purchase.location.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(purchases.len())
    }

    /// Export account balances to CSV
    pub async fn export_accounts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "username", "email", "balance_cents", "bonus"])?;

        for account in &accounts {
            csv_writer.write_record([
                account.id.to_string(),
                account.username.clone(),
                account.email.clone(),
                account.balance_cents.to_string(),
                account.bonus.as_str().to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export purchases as a JSON array
    pub async fn export_purchases_json<W: Write>(&self, mut writer: W) -> Result<usize> {
        let purchases = self.service.list_all_purchases().await?;
        serde_json::to_writer_pretty(&mut writer, &purchases)?;
        writer.flush()?;
        Ok(purchases.len())
    }

    /// Export accounts as a JSON array
    pub async fn export_accounts_json<W: Write>(&self, mut writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts().await?;
        serde_json::to_writer_pretty(&mut writer, &accounts)?;
        writer.flush()?;
        Ok(accounts.len())
    }

    /// Export the whole ledger as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let contents = self.service.contents().await?;

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts: contents.accounts,
            purchases: contents.purchases,
            entries: contents.entries,
        };

        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;

        Ok(snapshot)
    }
}
