mod common;

use anyhow::Result;
use common::{funded, open, test_service, test_service_with};
use shopledger::application::{LedgerError, LedgerSettings};
use shopledger::domain::{replay_balance, BonusState, EntryKind};
use uuid::Uuid;

#[tokio::test]
async fn test_debit_to_zero_then_insufficient_funds() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded(&service, "walter", 1000).await?;

    let balance = service.debit(account.id, 1000).await?;
    assert_eq!(balance, 0);

    let result = service.debit(account.id, 1).await;
    match result {
        Err(LedgerError::InsufficientFunds {
            account_id,
            balance,
            required,
        }) => {
            assert_eq!(account_id, account.id);
            assert_eq!(balance, 0);
            assert_eq!(required, 1);
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }

    assert_eq!(service.get_account(account.id).await?.balance_cents, 0);
    Ok(())
}

#[tokio::test]
async fn test_bonus_is_granted_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open(&service, "jesse").await?;
    assert_eq!(account.bonus, BonusState::Unclaimed);

    let first = service.credit_bonus_once(account.id).await?;
    assert!(first.granted);
    assert_eq!(first.new_balance, 1000);

    // Repeat claims are a normal outcome, not an error
    for _ in 0..3 {
        let again = service.credit_bonus_once(account.id).await?;
        assert!(!again.granted);
        assert_eq!(again.new_balance, 1000);
    }

    let account = service.get_account(account.id).await?;
    assert_eq!(account.balance_cents, 1000);
    assert_eq!(account.bonus, BonusState::Claimed);
    Ok(())
}

#[tokio::test]
async fn test_repeat_claim_after_spending_reports_current_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open(&service, "skyler").await?;

    service.credit_bonus_once(account.id).await?;
    service.debit(account.id, 400).await?;

    let again = service.credit_bonus_once(account.id).await?;
    assert!(!again.granted);
    assert_eq!(again.new_balance, 600);
    Ok(())
}

#[tokio::test]
async fn test_bonus_amount_comes_from_settings() -> Result<()> {
    let settings = LedgerSettings {
        bonus_cents: 250,
        ..LedgerSettings::default()
    };
    let (service, _temp) = test_service_with(settings).await?;
    let account = open(&service, "marie").await?;

    let grant = service.credit_bonus_once(account.id).await?;
    assert!(grant.granted);
    assert_eq!(grant.new_balance, 250);
    assert_eq!(service.bonus_amount(), 250);
    Ok(())
}

#[tokio::test]
async fn test_unknown_account_is_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ghost = Uuid::new_v4();

    assert!(matches!(
        service.credit_bonus_once(ghost).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        service.debit(ghost, 100).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        service.credit(ghost, 100).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        service.record_purchase(ghost, "heisenberg", 9999).await,
        Err(LedgerError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_non_positive_amounts_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded(&service, "hank", 500).await?;

    for amount in [0, -1, -500] {
        assert!(matches!(
            service.debit(account.id, amount).await,
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            service.credit(account.id, amount).await,
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    assert_eq!(service.get_account(account.id).await?.balance_cents, 500);
    Ok(())
}

#[tokio::test]
async fn test_credit_overflow_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded(&service, "gretchen", i64::MAX - 10).await?;

    let result = service.credit(account.id, 11).await;
    assert!(matches!(result, Err(LedgerError::BalanceOverflow { .. })));

    let balance = service.credit(account.id, 10).await?;
    assert_eq!(balance, i64::MAX);
    Ok(())
}

#[tokio::test]
async fn test_journal_tracks_every_mutation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open(&service, "mike").await?;

    service.credit_bonus_once(account.id).await?;
    service.credit(account.id, 500).await?;
    service.debit(account.id, 200).await?;
    service.record_purchase(account.id, "saul_goodman", 999).await?;
    // Rejected operations leave no trace
    let _ = service.debit(account.id, 100_000).await;
    let _ = service.credit_bonus_once(account.id).await?;

    let entries = service.list_entries(account.id).await?;
    let kinds: Vec<EntryKind> = entries.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntryKind::Bonus,
            EntryKind::Credit,
            EntryKind::Debit,
            EntryKind::Purchase
        ]
    );

    let balances: Vec<i64> = entries.iter().map(|e| e.balance_after).collect();
    assert_eq!(balances, vec![1000, 1500, 1300, 301]);

    let account = service.get_account(account.id).await?;
    assert_eq!(replay_balance(&entries), account.balance_cents);

    let statement = service.statement(account.id).await?;
    assert_eq!(statement.totals.credited, 1500);
    assert_eq!(statement.totals.debited, 1199);
    assert_eq!(statement.totals.bonus_entries, 1);
    Ok(())
}

#[tokio::test]
async fn test_repository_rejects_negative_amounts_without_writing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded(&service, "saul", 100).await?;
    let repo = service.repository();

    assert!(repo.credit(account.id, -5).await.is_err());
    assert!(repo.credit(account.id, i64::MIN).await.is_err());
    assert!(repo.claim_bonus(account.id, -5).await.is_err());

    let account = service.get_account(account.id).await?;
    assert_eq!(account.balance_cents, 100);
    assert_eq!(account.bonus, BonusState::Unclaimed);
    assert_eq!(service.list_entries(account.id).await?.len(), 1);
    assert!(service.check_integrity().await?.is_ok());
    Ok(())
}
