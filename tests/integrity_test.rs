mod common;

use anyhow::Result;
use common::{funded, open, test_service};
use shopledger::domain::IntegrityIssue;

#[tokio::test]
async fn test_clean_ledger_after_mixed_workload() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let walter = open(&service, "walter").await?;
    let jesse = funded(&service, "jesse", 5000).await?;

    service.credit_bonus_once(walter.id).await?;
    service.purchase(walter.id, "gus_fring", None).await?;
    service.debit(jesse.id, 1234).await?;
    service.record_purchase(jesse.id, "item_x", 766).await?;
    let _ = service.debit(walter.id, 10_000).await;

    let report = service.check_integrity().await?;
    assert!(report.is_ok(), "unexpected issues: {:?}", report.issues);
    assert_eq!(report.account_count, 2);
    assert_eq!(report.purchase_count, 2);
    // bonus, purchase, credit, debit, purchase
    assert_eq!(report.entry_count, 5);
    Ok(())
}

#[tokio::test]
async fn test_empty_ledger_is_clean() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let report = service.check_integrity().await?;
    assert!(report.is_ok());
    assert_eq!(report.account_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_tampered_balance_detected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded(&service, "saul", 700).await?;

    sqlx::query("UPDATE accounts SET balance_cents = 5000 WHERE id = ?")
        .bind(account.id.to_string())
        .execute(service.repository().pool())
        .await?;

    let report = service.check_integrity().await?;
    assert!(!report.is_ok());
    assert!(report.issues.iter().any(|issue| matches!(
        issue,
        IntegrityIssue::BalanceMismatch {
            stored: 5000,
            journal: 700,
            ..
        }
    )));
    Ok(())
}

#[tokio::test]
async fn test_bonus_flag_without_journal_entry_detected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open(&service, "lydia").await?;

    sqlx::query("UPDATE accounts SET bonus_claimed = 1 WHERE id = ?")
        .bind(account.id.to_string())
        .execute(service.repository().pool())
        .await?;

    let report = service.check_integrity().await?;
    assert!(report
        .issues
        .iter()
        .any(|issue| matches!(issue, IntegrityIssue::BonusMismatch { .. })));
    Ok(())
}

#[tokio::test]
async fn test_purchase_journal_is_append_only() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded(&service, "todd", 2000).await?;
    service.record_purchase(account.id, "item_x", 500).await?;

    let deleted = sqlx::query("DELETE FROM purchases")
        .execute(service.repository().pool())
        .await;
    assert!(deleted.is_err());

    let updated = sqlx::query("UPDATE ledger_entries SET amount_cents = 1")
        .execute(service.repository().pool())
        .await;
    assert!(updated.is_err());

    assert_eq!(service.list_purchases(account.id).await?.len(), 1);
    assert!(service.check_integrity().await?.is_ok());
    Ok(())
}
