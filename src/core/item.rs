//! Catalog items and the insertion-ordered, id-unique item set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A catalog product.
///
/// Identity is [`Item::id`]: two items with the same id are the same entity
/// no matter which tool call produced them. Field aliases accept the
/// catalog's ingestion names (`sku`, `shortDescription`, ...) so payloads
/// written by older tool versions still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique product id (SKU).
    #[serde(alias = "sku")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    #[serde(alias = "shortDescription")]
    pub description: String,
    /// Customer rating out of 5.
    #[serde(default, alias = "customerRating")]
    pub rating: Option<f32>,
    /// Product page URL.
    #[serde(alias = "productUrl")]
    pub url: String,
    /// Regular (non-sale) price in CAD.
    #[serde(alias = "regularPrice")]
    pub regular_price: f64,
    /// Current price in CAD.
    #[serde(alias = "salePrice")]
    pub sale_price: f64,
    /// Category name.
    #[serde(alias = "categoryName")]
    pub category: String,
    /// Whether a sale is active.
    #[serde(default, alias = "isOnSale")]
    pub on_sale: bool,
    /// High resolution image URL.
    #[serde(default, alias = "highResImage", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Item {
    /// Amount saved against the regular price, when on sale.
    #[must_use]
    pub fn savings(&self) -> Option<f64> {
        (self.on_sale && self.regular_price > self.sale_price)
            .then(|| self.regular_price - self.sale_price)
    }
}

/// Ordered set of items, unique by id. First occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct ItemSet {
    items: Vec<Item>,
    seen: HashSet<String>,
}

impl ItemSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `item` unless an item with the same id is already present.
    ///
    /// Returns `true` if the item was inserted.
    pub fn insert_if_unseen(&mut self, item: Item) -> bool {
        if self.seen.contains(&item.id) {
            return false;
        }
        self.seen.insert(item.id.clone());
        self.items.push(item);
        true
    }

    /// Merges `items` with [`ItemSet::insert_if_unseen`], returning how many
    /// were new.
    pub fn merge(&mut self, items: impl IntoIterator<Item = Item>) -> usize {
        let mut added = 0;
        for item in items {
            if self.insert_if_unseen(item) {
                added += 1;
            }
        }
        added
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consumes the set, returning items in first-seen order.
    #[must_use]
    pub fn into_vec(self) -> Vec<Item> {
        self.items
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a minimal item for tests.
    pub(crate) fn item(id: &str, name: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{name} description"),
            rating: Some(4.5),
            url: format!("https://shop.example/p/{id}"),
            regular_price: 100.0,
            sale_price: 80.0,
            category: "Monitors".to_string(),
            on_sale: true,
            image: None,
        }
    }

    #[test]
    fn test_insert_if_unseen_first_wins() {
        let mut set = ItemSet::new();
        assert!(set.insert_if_unseen(item("A", "first")));
        assert!(!set.insert_if_unseen(item("A", "second")));
        let items = set.into_vec();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "first");
    }

    #[test]
    fn test_merge_counts_new_items() {
        let mut set = ItemSet::new();
        set.merge(vec![item("A", "a"), item("B", "b")]);
        let added = set.merge(vec![item("A", "a"), item("C", "c"), item("C", "c2")]);
        assert_eq!(added, 1);
        let ids: Vec<String> = set.into_vec().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_item_accepts_catalog_field_names() {
        let json = r#"{
            "sku": "18470962",
            "name": "AirPods 4",
            "shortDescription": "Earbuds",
            "customerRating": 4.0,
            "productUrl": "https://shop.example/p/18470962",
            "regularPrice": 179.99,
            "salePrice": 149.99,
            "categoryName": "Wireless Earbuds",
            "isOnSale": true,
            "highResImage": null
        }"#;
        let parsed: Item = serde_json::from_str(json).unwrap_or_else(|_| unreachable!());
        assert_eq!(parsed.id, "18470962");
        assert!(parsed.on_sale);
        assert!(parsed.image.is_none());
    }

    #[test]
    fn test_savings_only_when_on_sale() {
        let mut it = item("A", "a");
        assert!(it.savings().is_some_and(|s| (s - 20.0).abs() < 1e-9));
        it.on_sale = false;
        assert!(it.savings().is_none());
    }
}
