//! Shared category vocabulary.
//!
//! Turns only read it; the ingestion side swaps in a new list when the
//! catalog is reloaded. Readers clone an `Arc` snapshot under a short read
//! lock, so a turn keeps whatever list was current when it started.

use std::sync::{Arc, RwLock};

use tracing::info;

/// Read-mostly list of category names used to constrain query filters.
#[derive(Debug)]
pub struct CategoryVocabulary {
    current: RwLock<Arc<[String]>>,
}

impl CategoryVocabulary {
    /// Creates a vocabulary from `categories`, dropping blanks and
    /// case-insensitive duplicates while keeping first-seen order.
    #[must_use]
    pub fn new(categories: impl IntoIterator<Item = String>) -> Self {
        Self {
            current: RwLock::new(normalize(categories)),
        }
    }

    /// Returns the current list.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[String]> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replaces the list. In-flight turns keep their old snapshot.
    pub fn replace(&self, categories: impl IntoIterator<Item = String>) {
        let next = normalize(categories);
        info!(count = next.len(), "category vocabulary replaced");
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl Default for CategoryVocabulary {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn normalize(categories: impl IntoIterator<Item = String>) -> Arc<[String]> {
    let mut out: Vec<String> = Vec::new();
    for c in categories {
        let c = c.trim().to_string();
        if !c.is_empty() && !out.iter().any(|k| k.eq_ignore_ascii_case(&c)) {
            out.push(c);
        }
    }
    out.into()
}
