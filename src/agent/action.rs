//! Direct product actions.
//!
//! Product-card buttons run an email or purchase without a model turn. The
//! action goes through the same [`ToolExecutor`](super::executor::ToolExecutor)
//! handler the model would use, and reports a structured [`ActionOutcome`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::tool::ToolKind;

/// An action a client can trigger directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Email the product's details to the user.
    Email,
    /// Place an order for the product.
    Purchase,
}

impl ActionKind {
    /// Parses `email` or `purchase` (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "email" => Some(Self::Email),
            "purchase" => Some(Self::Purchase),
            _ => None,
        }
    }

    /// Action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Purchase => "purchase",
        }
    }

    /// The tool that carries out this action.
    #[must_use]
    pub const fn tool(self) -> ToolKind {
        match self {
            Self::Email => ToolKind::SendEmail,
            Self::Purchase => ToolKind::Purchase,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable result of a completed action.
///
/// Also the payload of successful `send_email` and `purchase` tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDetails {
    /// Name of the product acted on.
    pub product_name: String,
    /// Order reference, for purchases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Price charged in CAD, for purchases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Recipient address, for emails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Why an action did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFailure {
    /// The product id is unknown.
    ProductNotFound,
    /// The user id is unknown.
    UserNotFound,
    /// The handler ran but could not finish (transport down, timeout).
    ActionFailed,
}

/// Outcome of a direct action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Whether the action completed.
    pub success: bool,
    /// Text for the user.
    pub message: String,
    /// Structured result, when successful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ActionDetails>,
    /// Failure class, when unsuccessful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionFailure>,
}

impl ActionOutcome {
    /// A completed action.
    #[must_use]
    pub fn completed(message: impl Into<String>, details: Option<ActionDetails>) -> Self {
        Self {
            success: true,
            message: message.into(),
            details,
            error: None,
        }
    }

    /// An action that did not complete.
    #[must_use]
    pub fn failed(failure: ActionFailure, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: None,
            error: Some(failure),
        }
    }
}
