//! In-memory catalog: id lookup plus filtered term-overlap ranking.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::filter::DecomposedQuery;
use super::retriever::FilteredIndex;
use crate::core::Item;
use crate::error::AgentError;
use crate::services::ProductLookup;

const NAME_WEIGHT: f64 = 2.0;
const CATEGORY_WEIGHT: f64 = 1.5;
const DESCRIPTION_WEIGHT: f64 = 1.0;

/// Catalog held entirely in memory.
///
/// Ranking is a weighted term overlap over name, category, and
/// description. An empty semantic query ranks every filter match by
/// rating. Ties break on id so results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    items: Vec<Item>,
    by_id: HashMap<String, usize>,
}

impl InMemoryCatalog {
    /// Builds a catalog. Later duplicates of an id are ignored.
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        let mut kept = Vec::with_capacity(items.len());
        let mut by_id = HashMap::with_capacity(items.len());
        for item in items {
            if by_id.contains_key(&item.id) {
                continue;
            }
            by_id.insert(item.id.clone(), kept.len());
            kept.push(item);
        }
        Self { items: kept, by_id }
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct category names in first-seen order.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .filter(|i| seen.insert(i.category.as_str()))
            .map(|i| i.category.clone())
            .collect()
    }

    fn score(terms: &[String], item: &Item) -> f64 {
        let name = tokenize(&item.name);
        let category = tokenize(&item.category);
        let description = tokenize(&item.description);
        terms
            .iter()
            .map(|t| {
                let mut s = 0.0;
                if name.contains(t) {
                    s += NAME_WEIGHT;
                }
                if category.contains(t) {
                    s += CATEGORY_WEIGHT;
                }
                if description.contains(t) {
                    s += DESCRIPTION_WEIGHT;
                }
                s
            })
            .sum()
    }
}

#[async_trait]
impl ProductLookup for InMemoryCatalog {
    async fn get_item(&self, id: &str) -> Result<Item, AgentError> {
        self.by_id
            .get(id)
            .and_then(|&idx| self.items.get(idx))
            .cloned()
            .ok_or_else(|| AgentError::NotFound {
                kind: "item",
                id: id.to_string(),
            })
    }
}

#[async_trait]
impl FilteredIndex for InMemoryCatalog {
    async fn search(&self, query: &DecomposedQuery, k: usize) -> Result<Vec<Item>, AgentError> {
        let terms: Vec<String> = tokenize(&query.query).into_iter().collect();
        let mut scored: Vec<(f64, &Item)> = self
            .items
            .iter()
            .filter(|i| query.filter.matches(i))
            .map(|i| (Self::score(&terms, i), i))
            .filter(|(s, _)| terms.is_empty() || *s > 0.0)
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.total_cmp(sa)
                .then_with(|| {
                    b.rating
                        .unwrap_or(0.0)
                        .total_cmp(&a.rating.unwrap_or(0.0))
                })
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(scored.into_iter().take(k).map(|(_, i)| i.clone()).collect())
    }
}

/// Lowercased alphanumeric words of length two or more.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(str::to_lowercase)
        .collect()
}
