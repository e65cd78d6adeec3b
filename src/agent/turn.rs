//! The result of one turn, as returned to the client.

use serde::{Deserialize, Serialize};

use crate::core::{AccountInfo, Item, Order, Source};

/// Reply sent when a turn cannot complete.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, something went wrong while handling your request. Please try again.";

/// Outcome of a turn: reply text, matched products, provenance tag, and
/// any account or order data the tools produced.
///
/// Built once by the reconciler (or as a fallback by the orchestrator) and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    message: String,
    products: Vec<Item>,
    has_results: bool,
    source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    account_info: Option<AccountInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order_history: Option<Vec<Order>>,
}

impl TurnResult {
    pub(crate) const fn new(
        message: String,
        products: Vec<Item>,
        has_results: bool,
        source: Source,
        account_info: Option<AccountInfo>,
        order_history: Option<Vec<Order>>,
    ) -> Self {
        Self {
            message,
            products,
            has_results,
            source,
            account_info,
            order_history,
        }
    }

    /// A result carrying only `message`, tagged [`Source::None`].
    #[must_use]
    pub fn fallback(message: impl Into<String>) -> Self {
        Self::new(message.into(), Vec::new(), false, Source::None, None, None)
    }

    /// Reply text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Matched products, unique by id, in first-seen order.
    #[must_use]
    pub fn products(&self) -> &[Item] {
        &self.products
    }

    /// Whether any tool produced something to show.
    #[must_use]
    pub const fn has_results(&self) -> bool {
        self.has_results
    }

    /// Provenance tag.
    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    /// Account details, when `account_info` ran.
    #[must_use]
    pub const fn account_info(&self) -> Option<&AccountInfo> {
        self.account_info.as_ref()
    }

    /// Orders shown by `purchase_history`.
    #[must_use]
    pub fn order_history(&self) -> Option<&[Order]> {
        self.order_history.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::tests::item;

    #[test]
    fn test_fallback_shape() {
        let result = TurnResult::fallback(FALLBACK_REPLY);
        assert_eq!(result.source(), Source::None);
        assert!(!result.has_results());
        assert!(result.products().is_empty());
    }

    #[test]
    fn test_serialized_field_names() {
        let result = TurnResult::new(
            "Here you go".to_string(),
            vec![item("P1", "Monitor")],
            true,
            Source::ChatWithSearch,
            None,
            None,
        );
        let json = serde_json::to_value(&result).unwrap_or_default();
        assert_eq!(json["message"], "Here you go");
        assert_eq!(json["source"], "chat_with_search");
        assert_eq!(json["has_results"], true);
        assert_eq!(json["products"][0]["id"], "P1");
        assert!(json.get("account_info").is_none());
        assert!(json.get("order_history").is_none());
    }
}
