//! User profiles and order history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user as returned by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique user id.
    #[serde(alias = "userId")]
    pub id: String,
    /// Given name.
    #[serde(alias = "firstName")]
    pub first_name: String,
    /// Family name.
    #[serde(alias = "lastName")]
    pub last_name: String,
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone: String,
}

impl UserProfile {
    /// Name used in greetings; falls back to `"there"` when blank.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        let name = self.first_name.trim();
        if name.is_empty() { "there" } else { name }
    }

    /// Full display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Account details exposed to the client by the `account_info` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Full name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone: String,
}

impl From<&UserProfile> for AccountInfo {
    fn from(user: &UserProfile) -> Self {
        Self {
            name: user.full_name(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product name.
    pub name: String,
    /// Product id.
    #[serde(alias = "sku")]
    pub item_id: String,
    /// Quantity ordered.
    pub quantity: u32,
    /// Line total.
    pub total: f64,
}

/// A past order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order reference number.
    #[serde(alias = "orderNumber")]
    pub reference: String,
    /// When the order was placed.
    #[serde(alias = "orderDate")]
    pub date: DateTime<Utc>,
    /// Order status (e.g. `"InProcess"`).
    #[serde(default)]
    pub status: String,
    /// Line items.
    #[serde(alias = "lineItems")]
    pub line_items: Vec<LineItem>,
    /// Order total in CAD.
    #[serde(alias = "totalPrice")]
    pub total: f64,
}

impl Order {
    /// Total number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.line_items.iter().map(|l| l.quantity).sum()
    }
}
