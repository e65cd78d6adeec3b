//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::{ActionFailure, ActionOutcome, ToolDefinition, TurnResult};
use crate::core::Item;
use crate::error::{CommandError, Result};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name (case-insensitive).
    ///
    /// # Errors
    ///
    /// [`CommandError::UnknownFormat`] for anything but `text` or `json`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(CommandError::UnknownFormat(s.to_string())),
        }
    }

    /// Serializes `value` as pretty JSON.
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}\n"))
    }
}

/// Formats a turn result.
#[must_use]
pub fn format_turn(result: &TurnResult, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(result);
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", result.message());
    let _ = writeln!(
        out,
        "\n---\nSource: {} | Results: {} | Products: {}",
        result.source(),
        if result.has_results() { "yes" } else { "no" },
        result.products().len()
    );
    for (i, item) in result.products().iter().enumerate() {
        let _ = writeln!(out, "  {}", item_line(i, item));
    }
    if let Some(info) = result.account_info() {
        let _ = writeln!(out, "Account: {} <{}>, {}", info.name, info.email, info.phone);
    }
    if let Some(orders) = result.order_history() {
        let _ = writeln!(out, "Orders shown: {}", orders.len());
    }
    out
}

/// Formats the outcome of a direct action.
#[must_use]
pub fn format_action(outcome: &ActionOutcome, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(outcome);
    }
    let mut out = String::new();
    let _ = writeln!(out, "{}", outcome.message);
    match (&outcome.details, outcome.error) {
        (Some(details), _) => {
            let _ = write!(out, "\n---\nProduct: {}", details.product_name);
            if let Some(order_id) = &details.order_id {
                let _ = write!(out, " | Order: {order_id}");
            }
            if let Some(price) = details.price {
                let _ = write!(out, " | Price: ${price:.2} CAD");
            }
            if let Some(email) = &details.email {
                let _ = write!(out, " | Email: {email}");
            }
            out.push('\n');
        }
        (None, Some(failure)) => {
            let _ = writeln!(out, "\n---\nFailed: {}", failure_label(failure));
        }
        (None, None) => {}
    }
    out
}

const fn failure_label(failure: ActionFailure) -> &'static str {
    match failure {
        ActionFailure::ProductNotFound => "product_not_found",
        ActionFailure::UserNotFound => "user_not_found",
        ActionFailure::ActionFailed => "action_failed",
    }
}

/// Formats search hits.
#[must_use]
pub fn format_items(items: &[Item], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(&items),
        OutputFormat::Text if items.is_empty() => "No products found.\n".to_string(),
        OutputFormat::Text => {
            let mut out = format!("Found {} products:\n", items.len());
            for (i, item) in items.iter().enumerate() {
                let _ = writeln!(out, "  {}", item_line(i, item));
            }
            out
        }
    }
}

/// Formats tool definitions.
#[must_use]
pub fn format_tools(definitions: &[ToolDefinition], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(&definitions);
    }
    let mut out = String::new();
    for def in definitions {
        let _ = writeln!(out, "{:<18} {}", def.name, first_sentence(&def.description));
    }
    out
}

fn item_line(index: usize, item: &Item) -> String {
    let mut line = format!(
        "{}. {} (SKU: {}) ${:.2} CAD",
        index + 1,
        item.name,
        item.id,
        item.sale_price
    );
    if item.on_sale {
        let _ = write!(line, " [ON SALE, was ${:.2}]", item.regular_price);
    }
    if let Some(rating) = item.rating {
        let _ = write!(line, " {rating}/5");
    }
    line
}

fn first_sentence(text: &str) -> &str {
    text.split_once(". ").map_or(text, |(head, _)| head)
}
