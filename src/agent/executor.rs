//! Tool executor that dispatches tool calls to the bound collaborators.
//!
//! Each call is parsed into a [`ToolInvocation`] (one variant per tool,
//! holding its validated arguments) and run against the user and services
//! bound at construction. Every failure is turned into text for the model
//! here; nothing a tool does can abort the turn.

use std::fmt::Write;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::action::ActionDetails;
use super::retrieval::RetrievalAdapter;
use super::tool::{ToolCall, ToolKind, ToolResult, ToolSet, ToolStatus};
use crate::core::{AccountInfo, Item, UserProfile};
use crate::email::render_product_email;
use crate::error::AgentError;
use crate::services::Services;

/// Items listed in a search result.
const SEARCH_PREVIEW_COUNT: usize = 5;
/// Characters of description shown per search hit.
const DESCRIPTION_PREVIEW_CHARS: usize = 150;
/// Web results listed per search.
const WEB_RESULT_COUNT: usize = 3;
/// Characters of content shown per web result.
const WEB_CONTENT_CHARS: usize = 300;
/// Upper bound for the `purchase_history` limit argument.
const MAX_HISTORY_LIMIT: usize = 20;

/// A tool call with validated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    /// Catalog search.
    Search {
        /// Trimmed, non-empty query.
        query: String,
    },
    /// Email an item's details to the user.
    SendEmail {
        /// Item id.
        item_id: String,
    },
    /// Place an order for an item.
    Purchase {
        /// Item id.
        item_id: String,
    },
    /// Show account details.
    AccountInfo,
    /// List past orders.
    PurchaseHistory {
        /// Requested preview length, if any.
        limit: Option<usize>,
    },
    /// Web search.
    WebSearch {
        /// Trimmed, non-empty query.
        query: String,
    },
}

impl ToolInvocation {
    /// Validates `call`'s arguments for `kind`.
    ///
    /// # Errors
    ///
    /// [`AgentError::ToolExecution`] for malformed or missing arguments.
    pub fn parse(kind: ToolKind, call: &ToolCall) -> Result<Self, AgentError> {
        let args = call.parse_arguments()?;
        Ok(match kind {
            ToolKind::Search => Self::Search {
                query: required_text(&args, kind, &["query"])?,
            },
            ToolKind::SendEmail => Self::SendEmail {
                item_id: required_text(&args, kind, &["product_id", "item_id", "sku"])?,
            },
            ToolKind::Purchase => Self::Purchase {
                item_id: required_text(&args, kind, &["product_id", "item_id", "sku"])?,
            },
            ToolKind::AccountInfo => Self::AccountInfo,
            ToolKind::PurchaseHistory => Self::PurchaseHistory {
                limit: args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .and_then(|n| usize::try_from(n).ok()),
            },
            ToolKind::WebSearch => Self::WebSearch {
                query: required_text(&args, kind, &["query"])?,
            },
        })
    }

    /// The tool this invocation targets.
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        match self {
            Self::Search { .. } => ToolKind::Search,
            Self::SendEmail { .. } => ToolKind::SendEmail,
            Self::Purchase { .. } => ToolKind::Purchase,
            Self::AccountInfo => ToolKind::AccountInfo,
            Self::PurchaseHistory { .. } => ToolKind::PurchaseHistory,
            Self::WebSearch { .. } => ToolKind::WebSearch,
        }
    }
}

/// First non-empty string (or number) among `keys`.
fn required_text(
    args: &Map<String, Value>,
    kind: ToolKind,
    keys: &[&str],
) -> Result<String, AgentError> {
    keys.iter()
        .filter_map(|k| args.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| {
            AgentError::tool(
                kind.name(),
                format!("missing required argument '{}'", keys.first().unwrap_or(&"")),
            )
        })
}

/// What a handler produced before it is tied to a call id.
struct ToolOutcome {
    content: String,
    status: ToolStatus,
    payload: Option<Value>,
}

impl ToolOutcome {
    fn success(content: String) -> Self {
        Self {
            content,
            status: ToolStatus::Success,
            payload: None,
        }
    }

    fn no_matches(content: &str) -> Self {
        Self {
            content: content.to_string(),
            status: ToolStatus::NoMatches,
            payload: None,
        }
    }

    fn failed(content: String) -> Self {
        Self {
            content,
            status: ToolStatus::Failed,
            payload: None,
        }
    }

    fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Executes tool calls for one user within one turn.
///
/// Built by [`ToolRegistry::bind`](super::registry::ToolRegistry::bind);
/// holds no mutable state, so calls may run concurrently.
pub struct ToolExecutor {
    user: UserProfile,
    services: Services,
    retrieval: RetrievalAdapter,
    tools: ToolSet,
    tool_timeout: Duration,
    history_limit: usize,
}

impl ToolExecutor {
    /// Creates an executor bound to `user`.
    #[must_use]
    pub fn new(
        user: UserProfile,
        services: Services,
        retrieval: RetrievalAdapter,
        tools: ToolSet,
        tool_timeout: Duration,
        history_limit: usize,
    ) -> Self {
        Self {
            user,
            services,
            retrieval,
            tools,
            tool_timeout,
            history_limit: history_limit.max(1),
        }
    }

    /// The tools offered this turn.
    #[must_use]
    pub const fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// The bound user.
    #[must_use]
    pub const fn user(&self) -> &UserProfile {
        &self.user
    }

    /// Runs `calls` and returns one result per call, in call order.
    pub async fn execute_all(&self, calls: &[ToolCall], parallel: bool) -> Vec<ToolResult> {
        if parallel && calls.len() > 1 {
            join_all(calls.iter().map(|c| self.execute(c))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute(call).await);
            }
            results
        }
    }

    /// Dispatches a tool call. Never fails; errors become result text.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(kind) = call.kind() else {
            warn!(tool = %call.name, call_id = %call.id, "unknown tool requested");
            return ToolResult::failed(
                &call.id,
                &call.name,
                format!("unknown tool '{}'", call.name),
            );
        };
        if !self.tools.contains(kind) {
            warn!(tool = kind.name(), call_id = %call.id, "tool not offered this turn");
            return ToolResult::failed(
                &call.id,
                kind.name(),
                format!("The {} tool is not available right now.", kind.name()),
            );
        }
        let invocation = match ToolInvocation::parse(kind, call) {
            Ok(inv) => inv,
            Err(e) => {
                warn!(tool = kind.name(), call_id = %call.id, error = %e, "rejected tool arguments");
                return ToolResult::failed(&call.id, kind.name(), e.to_string());
            }
        };

        debug!(tool = kind.name(), call_id = %call.id, "executing tool");
        let outcome = match &invocation {
            ToolInvocation::Search { query } => self.search(query).await,
            ToolInvocation::SendEmail { item_id } => self.send_email(item_id).await,
            ToolInvocation::Purchase { item_id } => self.purchase(item_id).await,
            ToolInvocation::AccountInfo => self.account_info(),
            ToolInvocation::PurchaseHistory { limit } => self.purchase_history(*limit).await,
            ToolInvocation::WebSearch { query } => self.web_search(query).await,
        };

        match outcome {
            Ok(out) => {
                debug!(
                    tool = kind.name(),
                    call_id = %call.id,
                    status = ?out.status,
                    has_payload = out.payload.is_some(),
                    "tool execution complete"
                );
                ToolResult {
                    tool_call_id: call.id.clone(),
                    tool_name: kind.name().to_string(),
                    content: out.content,
                    status: out.status,
                    payload: out.payload,
                }
            }
            Err(e) => {
                warn!(tool = kind.name(), call_id = %call.id, error = %e, "tool failed");
                ToolResult::failed(&call.id, kind.name(), describe_failure(kind, &e))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    async fn search(&self, query: &str) -> Result<ToolOutcome, AgentError> {
        let items = self.retrieval.try_decompose_and_search(query).await?;
        if items.is_empty() {
            return Ok(ToolOutcome::no_matches(
                "No products found matching your search. Try different keywords or browse our categories.",
            ));
        }
        let shown: Vec<&Item> = items.iter().take(SEARCH_PREVIEW_COUNT).collect();
        let payload = serde_json::to_value(&shown)
            .map_err(|e| AgentError::tool("search", format!("serialization error: {e}")))?;
        info!(query, hits = items.len(), "search returned products");
        Ok(ToolOutcome::success(format_search_results(items.len(), &shown)).with_payload(payload))
    }

    async fn send_email(&self, item_id: &str) -> Result<ToolOutcome, AgentError> {
        let item = self.services.products.get_item(item_id).await?;
        let email = render_product_email(&self.user, &item);

        match tokio::time::timeout(self.tool_timeout, self.services.mailer.send(&email)).await {
            Err(_) => {
                warn!(item_id, timeout = ?self.tool_timeout, "email send timed out, delivery unknown");
                Ok(ToolOutcome::failed(format!(
                    "The email service did not respond in time, so I can't confirm whether the \
                     details for **{}** reached {}. Please check your inbox before asking me to \
                     send it again.",
                    item.name, self.user.email
                )))
            }
            Ok(Err(e)) => Err(e),
            Ok(Ok(())) => {
                info!(item_id, to = %self.user.email, "product email sent");
                let details = ActionDetails {
                    product_name: item.name.clone(),
                    order_id: None,
                    price: None,
                    email: Some(self.user.email.clone()),
                };
                Ok(ToolOutcome::success(format!(
                    "Done! I've sent the details for **{}** to {}. Check your inbox!",
                    item.name, self.user.email
                ))
                .with_payload(action_payload(&details)?))
            }
        }
    }

    async fn purchase(&self, item_id: &str) -> Result<ToolOutcome, AgentError> {
        let item = self.services.products.get_item(item_id).await?;
        let reference = order_reference(&item.id, &self.user.id);
        info!(item_id, order = %reference, "purchase recorded");
        let text = format!(
            "Great choice! Your order for **{}** has been placed. Order ID: `{reference}`. \
             Total: ${:.2} CAD. A confirmation will be sent to {}.",
            item.name, item.sale_price, self.user.email
        );
        let details = ActionDetails {
            product_name: item.name,
            order_id: Some(reference),
            price: Some(item.sale_price),
            email: None,
        };
        Ok(ToolOutcome::success(text).with_payload(action_payload(&details)?))
    }

    fn account_info(&self) -> Result<ToolOutcome, AgentError> {
        let info = AccountInfo::from(&self.user);
        let payload = serde_json::to_value(&info)
            .map_err(|e| AgentError::tool("account_info", format!("serialization error: {e}")))?;
        Ok(ToolOutcome::success(format!(
            "User Account Information:\nName: {}\nEmail: {}\nPhone: {}",
            info.name, info.email, info.phone
        ))
        .with_payload(payload))
    }

    async fn purchase_history(&self, limit: Option<usize>) -> Result<ToolOutcome, AgentError> {
        let orders = self.services.orders.get_orders(&self.user.id).await?;
        if orders.is_empty() {
            return Ok(
                ToolOutcome::no_matches("You don't have any purchase history yet.")
                    .with_payload(Value::Array(Vec::new())),
            );
        }
        let limit = limit
            .unwrap_or(self.history_limit)
            .clamp(1, MAX_HISTORY_LIMIT);
        let shown = &orders[..orders.len().min(limit)];

        let mut text = format!(
            "I found {} order(s) in your purchase history:\n",
            orders.len()
        );
        for (idx, order) in shown.iter().enumerate() {
            let count = order.line_items.len();
            let _ = write!(
                text,
                "\n{}. Order #{} on {}: {count} {}, ${:.2}",
                idx + 1,
                order.reference,
                order.date.format("%B %d, %Y"),
                if count == 1 { "item" } else { "items" },
                order.total
            );
        }
        if orders.len() > shown.len() {
            let _ = write!(
                text,
                "\n\n...and {} more order(s)",
                orders.len() - shown.len()
            );
        }

        let payload = serde_json::to_value(shown).map_err(|e| {
            AgentError::tool("purchase_history", format!("serialization error: {e}"))
        })?;
        Ok(ToolOutcome::success(text).with_payload(payload))
    }

    async fn web_search(&self, query: &str) -> Result<ToolOutcome, AgentError> {
        let results = self.services.web.search(query).await?;
        if results.is_empty() {
            return Ok(ToolOutcome::no_matches("No results found for your query."));
        }
        let formatted: Vec<String> = results
            .iter()
            .take(WEB_RESULT_COUNT)
            .map(|r| {
                format!(
                    "**{}**\n{}\nSource: {}",
                    r.title,
                    truncate_chars(&r.content, WEB_CONTENT_CHARS),
                    r.url
                )
            })
            .collect();
        info!(query, results = formatted.len(), "web search returned results");
        Ok(ToolOutcome::success(formatted.join("\n\n")))
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("user", &self.user.id)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

/// Deterministic order reference: `ORD-{item id}-{last 4 chars of user id}`.
#[must_use]
pub fn order_reference(item_id: &str, user_id: &str) -> String {
    let chars: Vec<char> = user_id.chars().collect();
    let suffix: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("ORD-{item_id}-{suffix}")
}

fn action_payload(details: &ActionDetails) -> Result<Value, AgentError> {
    serde_json::to_value(details)
        .map_err(|e| AgentError::tool("action", format!("serialization error: {e}")))
}

fn describe_failure(kind: ToolKind, err: &AgentError) -> String {
    if let AgentError::NotFound { kind: "item", id } = err {
        return format!(
            "Product with SKU '{id}' not found. Please check the product ID and try again."
        );
    }
    match kind {
        ToolKind::Search => format!("Search failed: {err}. Please try again."),
        ToolKind::SendEmail => format!("Failed to send email: {err}. Please try again."),
        ToolKind::Purchase => format!("Failed to place order: {err}. Please try again."),
        ToolKind::AccountInfo => format!("Failed to retrieve account information: {err}"),
        ToolKind::PurchaseHistory => format!("Failed to retrieve purchase history: {err}"),
        ToolKind::WebSearch => format!("Web search failed: {err}"),
    }
}

fn format_search_results(total: usize, shown: &[&Item]) -> String {
    let mut text = format!("Found {total} products:\n");
    for (i, item) in shown.iter().enumerate() {
        let sale_tag = if item.on_sale { " [ON SALE]" } else { "" };
        let rating = item
            .rating
            .map(|r| format!(" | Rating: {r}/5"))
            .unwrap_or_default();
        let _ = write!(
            text,
            "\n{}. **{}** (SKU: {}){sale_tag}{rating}\n   Price: ${:.2} CAD",
            i + 1,
            item.name,
            item.id,
            item.sale_price
        );
        if item.on_sale {
            let _ = write!(text, " (was ${:.2})", item.regular_price);
        }
        let _ = write!(
            text,
            "\n   Category: {}\n   {}\n",
            item.category,
            truncate_chars(&item.description, DESCRIPTION_PREVIEW_CHARS)
        );
    }
    text
}

fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
