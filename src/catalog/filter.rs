//! Structured metadata filter produced by query decomposition.
//!
//! The decomposer emits loosely-typed conditions (`{"attribute", "op",
//! "value"}`); [`MetadataFilter::from_raw`] validates them into typed
//! [`Condition`]s, dropping anything it cannot interpret and any category
//! value outside the vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::Item;

/// A condition as emitted by the decomposer, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCondition {
    /// Attribute name (`sale_price`, `rating`, `category`, ...).
    pub attribute: String,
    /// Operator (`lte`, `>=`, `in`, `eq`, ...).
    #[serde(alias = "operator", alias = "comparator")]
    pub op: String,
    /// Operand.
    pub value: Value,
}

/// Numeric comparison against a bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Bound {
    /// `<=`
    Lte(f64),
    /// `>=`
    Gte(f64),
    /// `<`
    Lt(f64),
    /// `>`
    Gt(f64),
}

impl Bound {
    fn parse(op: &str, value: &Value) -> Option<Self> {
        let n = value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim_start_matches('$').parse().ok()))?;
        match op {
            "lte" | "le" | "<=" => Some(Self::Lte(n)),
            "gte" | "ge" | ">=" => Some(Self::Gte(n)),
            "lt" | "<" => Some(Self::Lt(n)),
            "gt" | ">" => Some(Self::Gt(n)),
            _ => None,
        }
    }

    /// Whether `x` satisfies the bound.
    #[must_use]
    pub fn accepts(self, x: f64) -> bool {
        match self {
            Self::Lte(b) => x <= b,
            Self::Gte(b) => x >= b,
            Self::Lt(b) => x < b,
            Self::Gt(b) => x > b,
        }
    }
}

/// A validated filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "attribute", rename_all = "snake_case")]
pub enum Condition {
    /// Current price bound.
    SalePrice {
        /// The bound.
        bound: Bound,
    },
    /// Regular price bound.
    RegularPrice {
        /// The bound.
        bound: Bound,
    },
    /// Rating floor or ceiling. Unrated items never match.
    Rating {
        /// The bound.
        bound: Bound,
    },
    /// Sale flag equals.
    OnSale {
        /// Required flag value.
        value: bool,
    },
    /// Category is one of (canonical vocabulary spellings).
    Category {
        /// Accepted categories.
        any_of: Vec<String>,
    },
}

impl Condition {
    /// Validates a raw condition. Returns `None` when the attribute, operator,
    /// or operand is not understood, or when no category value survives the
    /// vocabulary check.
    #[must_use]
    pub fn from_raw(raw: &RawCondition, vocabulary: &[String]) -> Option<Self> {
        let op = raw.op.trim().to_lowercase();
        match normalize_attribute(&raw.attribute)? {
            "sale_price" => Bound::parse(&op, &raw.value).map(|bound| Self::SalePrice { bound }),
            "regular_price" => {
                Bound::parse(&op, &raw.value).map(|bound| Self::RegularPrice { bound })
            }
            "rating" => Bound::parse(&op, &raw.value).map(|bound| Self::Rating { bound }),
            "on_sale" => {
                if !matches!(op.as_str(), "eq" | "=" | "==") {
                    return None;
                }
                let value = raw
                    .value
                    .as_bool()
                    .or_else(|| raw.value.as_str().and_then(|s| s.parse().ok()))?;
                Some(Self::OnSale { value })
            }
            "category" => {
                let requested: Vec<&str> = match (op.as_str(), &raw.value) {
                    ("in", Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
                    ("eq" | "=" | "==" | "in", Value::String(s)) => vec![s.as_str()],
                    _ => return None,
                };
                let any_of: Vec<String> = requested
                    .into_iter()
                    .filter_map(|c| canonical_category(c, vocabulary))
                    .collect();
                (!any_of.is_empty()).then_some(Self::Category { any_of })
            }
            _ => None,
        }
    }

    /// Whether `item` satisfies this condition.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Self::SalePrice { bound } => bound.accepts(item.sale_price),
            Self::RegularPrice { bound } => bound.accepts(item.regular_price),
            Self::Rating { bound } => item.rating.is_some_and(|r| bound.accepts(f64::from(r))),
            Self::OnSale { value } => item.on_sale == *value,
            Self::Category { any_of } => any_of
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&item.category)),
        }
    }
}

fn normalize_attribute(name: &str) -> Option<&'static str> {
    match name.trim() {
        "sale_price" | "salePrice" | "price" => Some("sale_price"),
        "regular_price" | "regularPrice" => Some("regular_price"),
        "rating" | "customerRating" | "customer_rating" => Some("rating"),
        "on_sale" | "isOnSale" | "is_on_sale" => Some("on_sale"),
        "category" | "categoryName" | "category_name" => Some("category"),
        _ => None,
    }
}

fn canonical_category(requested: &str, vocabulary: &[String]) -> Option<String> {
    vocabulary
        .iter()
        .find(|known| known.eq_ignore_ascii_case(requested.trim()))
        .cloned()
}

/// Conjunction of validated conditions. Empty means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// All conditions must hold.
    pub conditions: Vec<Condition>,
}

impl MetadataFilter {
    /// Validates raw conditions, silently dropping the ones that fail.
    #[must_use]
    pub fn from_raw(raw: &[RawCondition], vocabulary: &[String]) -> Self {
        let conditions: Vec<Condition> = raw
            .iter()
            .filter_map(|r| {
                let parsed = Condition::from_raw(r, vocabulary);
                if parsed.is_none() {
                    debug!(attribute = %r.attribute, op = %r.op, "dropping filter condition");
                }
                parsed
            })
            .collect();
        Self { conditions }
    }

    /// Returns `true` if no conditions are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `item` satisfies every condition.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        self.conditions.iter().all(|c| c.matches(item))
    }
}

/// Output of query decomposition: semantic text plus a structured filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecomposedQuery {
    /// Text used for similarity ranking.
    pub query: String,
    /// Metadata filter applied before ranking.
    #[serde(default)]
    pub filter: MetadataFilter,
}

impl DecomposedQuery {
    /// A query with no filter.
    #[must_use]
    pub fn unfiltered(text: &str) -> Self {
        Self {
            query: text.trim().to_string(),
            filter: MetadataFilter::default(),
        }
    }
}
