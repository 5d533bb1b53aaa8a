// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use shopledger::application::{LedgerService, LedgerSettings};
use shopledger::domain::{Account, Cents};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    test_service_with(LedgerSettings::default()).await
}

/// Helper to create a test service with custom settings
pub async fn test_service_with(settings: LedgerSettings) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap(), &settings).await?;
    Ok((service, temp_dir))
}

/// Register an account named `username` with a derived email
pub async fn open(service: &LedgerService, username: &str) -> Result<Account> {
    Ok(service
        .open_account(username.to_string(), format!("{}@example.com", username))
        .await?)
}

/// Register an account and credit it with `cents`
pub async fn funded(service: &LedgerService, username: &str, cents: Cents) -> Result<Account> {
    let account = open(service, username).await?;
    if cents > 0 {
        service.credit(account.id, cents).await?;
    }
    Ok(service.get_account(account.id).await?)
}
