use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Cents;

/// Flags sold by the default storefront.
const DEFAULT_ITEMS: &[(&str, Cents)] = &[
    ("jesse_pinkman", 999),
    ("saul_goodman", 999),
    ("gus_fring", 999),
    ("mike_ehrmantraut", 999),
    ("hank_schrader", 999),
    ("heisenberg", 9999),
];

/// Item price list. The ledger trusts whatever price it is handed; this is
/// where callers get it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    items: BTreeMap<String, Cents>,
}

impl Catalog {
    pub fn new(items: BTreeMap<String, Cents>) -> Result<Self, CatalogError> {
        for (item_id, price) in &items {
            if item_id.trim().is_empty() {
                return Err(CatalogError::EmptyItemId);
            }
            if *price <= 0 {
                return Err(CatalogError::NonPositivePrice {
                    item_id: item_id.clone(),
                    price: *price,
                });
            }
        }
        Ok(Self { items })
    }

    pub fn price_of(&self, item_id: &str) -> Option<Cents> {
        self.items.get(item_id).copied()
    }

    /// Items in id order.
    pub fn items(&self) -> impl Iterator<Item = (&str, Cents)> {
        self.items.iter().map(|(id, price)| (id.as_str(), *price))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            items: DEFAULT_ITEMS
                .iter()
                .map(|(id, price)| (id.to_string(), *price))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog item id must not be empty")]
    EmptyItemId,

    #[error("catalog price for {item_id} must be positive, got {price}")]
    NonPositivePrice { item_id: String, price: Cents },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_prices() {
        let catalog = Catalog::default();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.price_of("jesse_pinkman"), Some(999));
        assert_eq!(catalog.price_of("heisenberg"), Some(9999));
        assert_eq!(catalog.price_of("walter_jr"), None);
    }

    #[test]
    fn test_items_are_ordered_by_id() {
        let catalog = Catalog::default();
        let ids: Vec<&str> = catalog.items().map(|(id, _)| id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_catalog_rejects_bad_prices() {
        let mut items = BTreeMap::new();
        items.insert("free_sample".to_string(), 0);
        assert!(matches!(
            Catalog::new(items),
            Err(CatalogError::NonPositivePrice { .. })
        ));

        let mut items = BTreeMap::new();
        items.insert("  ".to_string(), 100);
        assert_eq!(Catalog::new(items), Err(CatalogError::EmptyItemId));
    }
}
