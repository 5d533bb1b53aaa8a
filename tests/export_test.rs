mod common;

use anyhow::Result;
use common::{funded, open, test_service};
use shopledger::io::Exporter;

#[tokio::test]
async fn test_export_purchases_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded(&service, "walter", 3000).await?;
    service
        .purchase(account.id, "saul_goodman", Some("US-ABQ".to_string()))
        .await?;
    service.record_purchase(account.id, "item_x", 250).await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_purchases_csv(&mut buffer)
        .await?;
    assert_eq!(count, 2);

    let csv = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("item_id"));
    assert!(csv.contains("saul_goodman"));
    assert!(csv.contains(",999,"));
    assert!(csv.contains("US-ABQ"));
    assert!(csv.contains("walter"));
    Ok(())
}

#[tokio::test]
async fn test_export_accounts_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open(&service, "jesse").await?;
    service.credit_bonus_once(account.id).await?;
    open(&service, "mike").await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_accounts_csv(&mut buffer)
        .await?;
    assert_eq!(count, 2);

    let csv = String::from_utf8(buffer)?;
    assert!(csv.contains("jesse"));
    assert!(csv.contains(",1000,"));
    assert!(csv.contains("claimed"));
    Ok(())
}

#[tokio::test]
async fn test_export_full_json() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open(&service, "gus").await?;
    service.credit_bonus_once(account.id).await?;
    service.purchase(account.id, "mike_ehrmantraut", None).await?;

    let mut buffer = Vec::new();
    let snapshot = Exporter::new(&service).export_full_json(&mut buffer).await?;
    assert_eq!(snapshot.accounts.len(), 1);
    assert_eq!(snapshot.purchases.len(), 1);
    assert_eq!(snapshot.entries.len(), 2);

    let json: serde_json::Value = serde_json::from_slice(&buffer)?;
    assert_eq!(json["accounts"][0]["username"], "gus");
    assert_eq!(json["accounts"][0]["balance_cents"], 1);
    assert_eq!(json["purchases"][0]["item_id"], "mike_ehrmantraut");
    Ok(())
}

#[tokio::test]
async fn test_export_purchases_json() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded(&service, "saul", 2000).await?;
    service
        .purchase(account.id, "gus_fring", Some("US-ABQ".to_string()))
        .await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_purchases_json(&mut buffer)
        .await?;
    assert_eq!(count, 1);

    let json: serde_json::Value = serde_json::from_slice(&buffer)?;
    assert_eq!(json.as_array().map(Vec::len), Some(1));
    assert_eq!(json[0]["item_id"], "gus_fring");
    assert_eq!(json[0]["price_cents"], 999);
    assert_eq!(json[0]["location"], "US-ABQ");
    assert_eq!(json[0]["account_id"], account.id.to_string());
    Ok(())
}

#[tokio::test]
async fn test_export_accounts_json() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open(&service, "marie").await?;
    service.credit_bonus_once(account.id).await?;
    open(&service, "hank").await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_accounts_json(&mut buffer)
        .await?;
    assert_eq!(count, 2);

    let json: serde_json::Value = serde_json::from_slice(&buffer)?;
    assert_eq!(json[0]["username"], "hank");
    assert_eq!(json[0]["bonus"], "unclaimed");
    assert_eq!(json[1]["username"], "marie");
    assert_eq!(json[1]["balance_cents"], 1000);
    assert_eq!(json[1]["bonus"], "claimed");
    Ok(())
}

#[tokio::test]
async fn test_full_export_keeps_journal_commit_order() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let walter = open(&service, "walter").await?;
    let jesse = open(&service, "jesse").await?;

    service.credit_bonus_once(walter.id).await?;
    service.credit(jesse.id, 500).await?;
    service.debit(walter.id, 100).await?;
    service.debit(jesse.id, 200).await?;

    let mut buffer = Vec::new();
    let snapshot = Exporter::new(&service).export_full_json(&mut buffer).await?;

    let order: Vec<_> = snapshot
        .entries
        .iter()
        .map(|entry| (entry.account_id, entry.balance_after))
        .collect();
    assert_eq!(
        order,
        vec![
            (walter.id, 1000),
            (jesse.id, 500),
            (walter.id, 900),
            (jesse.id, 300)
        ]
    );

    let contents = service.contents().await?;
    assert_eq!(contents.accounts.len(), snapshot.accounts.len());
    assert_eq!(contents.entries.len(), snapshot.entries.len());
    Ok(())
}
