use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type PurchaseId = Uuid;

/// An item bought from the catalog. Purchases are immutable and exist only
/// for debits that committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: PurchaseId,
    /// Buyer, for audit. The record does not own the account.
    pub account_id: AccountId,
    pub item_id: String,
    /// Price charged, in cents, as quoted at the time of purchase
    pub price_cents: Cents,
    /// Storefront location the purchase was made from, if the caller sent one
    pub location: Option<String>,
    pub purchased_at: DateTime<Utc>,
}

impl PurchaseRecord {
    pub fn new(account_id: AccountId, item_id: impl Into<String>, price_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            item_id: item_id.into(),
            price_cents,
            location: None,
            purchased_at: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
