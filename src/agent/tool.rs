//! Tool type definitions for function-calling.
//!
//! The tool catalog is closed: [`ToolKind`] names every tool the assistant
//! can call, its JSON schema, and the provenance a successful call earns.
//! Names from older persisted histories resolve through
//! [`ToolKind::from_name`] so those histories still reconcile.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

use crate::core::Source;
use crate::error::AgentError;

/// Maximum raw byte length of tool argument JSON from the LLM.
pub const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match [`ToolKind::name`]).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call within the turn.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments. Persisted histories may store an object
    /// here instead of a string; both decode.
    #[serde(default = "empty_arguments", deserialize_with = "arguments_from_any")]
    pub arguments: String,
}

fn empty_arguments() -> String {
    "{}".to_string()
}

fn arguments_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => empty_arguments(),
        other => other.to_string(),
    })
}

impl ToolCall {
    /// Creates a tool call.
    #[must_use]
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// The tool this call targets, if the name is known.
    #[must_use]
    pub fn kind(&self) -> Option<ToolKind> {
        ToolKind::from_name(&self.name)
    }

    /// Decodes the arguments into a key/value map.
    ///
    /// Blank arguments decode to an empty map.
    ///
    /// # Errors
    ///
    /// [`AgentError::ToolExecution`] when the arguments are oversized, not
    /// JSON, or not a JSON object.
    pub fn parse_arguments(&self) -> Result<Map<String, Value>, AgentError> {
        if self.arguments.len() > MAX_TOOL_ARGS_LEN {
            return Err(AgentError::tool(
                &self.name,
                format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    self.arguments.len()
                ),
            ));
        }
        if self.arguments.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AgentError::tool(&self.name, "arguments must be a JSON object")),
            Err(e) => Err(AgentError::tool(&self.name, format!("invalid arguments: {e}"))),
        }
    }
}

/// Outcome class of a tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// The tool did what was asked.
    #[default]
    Success,
    /// The tool ran but found nothing (no products, no orders, no pages).
    NoMatches,
    /// The tool could not complete; the text says why.
    Failed,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Name of the tool that produced it.
    #[serde(alias = "name")]
    pub tool_name: String,
    /// Text shown to the model.
    pub content: String,
    /// Outcome class.
    #[serde(default)]
    pub status: ToolStatus,
    /// Machine-readable data for the reconciler. Never sent to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ToolResult {
    /// A successful text-only result.
    #[must_use]
    pub fn text(tool_call_id: &str, tool_name: &str, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            content: content.into(),
            status: ToolStatus::Success,
            payload: None,
        }
    }

    /// A failed result carrying an explanation for the model.
    #[must_use]
    pub fn failed(tool_call_id: &str, tool_name: &str, content: impl Into<String>) -> Self {
        Self::text(tool_call_id, tool_name, content).with_status(ToolStatus::Failed)
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: ToolStatus) -> Self {
        self.status = status;
        self
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Returns `true` if the call failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Failed
    }
}

/// Every tool the assistant can be offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Catalog search.
    Search,
    /// Email product details to the user.
    SendEmail,
    /// Place an order.
    Purchase,
    /// Show the user's account details.
    AccountInfo,
    /// Show past orders.
    PurchaseHistory,
    /// General web search.
    WebSearch,
}

impl ToolKind {
    /// All tools, in the order they are offered.
    pub const ALL: [Self; 6] = [
        Self::Search,
        Self::SendEmail,
        Self::Purchase,
        Self::AccountInfo,
        Self::PurchaseHistory,
        Self::WebSearch,
    ];

    /// Canonical tool name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::SendEmail => "send_email",
            Self::Purchase => "purchase",
            Self::AccountInfo => "account_info",
            Self::PurchaseHistory => "purchase_history",
            Self::WebSearch => "web_search",
        }
    }

    /// Resolves a canonical or legacy tool name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "search" | "search_products" => Some(Self::Search),
            "send_email" | "send_product_email" => Some(Self::SendEmail),
            "purchase" | "purchase_product" => Some(Self::Purchase),
            "account_info" | "get_user_info" => Some(Self::AccountInfo),
            "purchase_history" | "get_purchase_history" => Some(Self::PurchaseHistory),
            "web_search" | "search_web" => Some(Self::WebSearch),
            _ => None,
        }
    }

    /// Provenance earned by a successful call.
    #[must_use]
    pub const fn success_source(self) -> Source {
        match self {
            Self::Search => Source::Search,
            Self::SendEmail | Self::Purchase => Source::Action,
            Self::AccountInfo => Source::Account,
            Self::PurchaseHistory => Source::History,
            Self::WebSearch => Source::ChatWithSearch,
        }
    }

    /// Function-calling schema for this tool.
    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        match self {
            Self::Search => def_search(),
            Self::SendEmail => def_send_email(),
            Self::Purchase => def_purchase(),
            Self::AccountInfo => def_account_info(),
            Self::PurchaseHistory => def_purchase_history(),
            Self::WebSearch => def_web_search(),
        }
    }
}

/// The tools offered to the model for one turn.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    kinds: Vec<ToolKind>,
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Tool set for a shopping turn. `web_search` is only included when
    /// the web-search collaborator reported itself available.
    #[must_use]
    pub fn for_turn(web_available: bool) -> Self {
        ToolKind::ALL
            .into_iter()
            .filter(|k| web_available || *k != ToolKind::WebSearch)
            .collect()
    }

    /// Returns the tool definitions in this set.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns `true` if `kind` is offered.
    #[must_use]
    pub fn contains(&self, kind: ToolKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.kinds.len()
    }
}

impl FromIterator<ToolKind> for ToolSet {
    fn from_iter<I: IntoIterator<Item = ToolKind>>(iter: I) -> Self {
        let mut set = Self::default();
        for kind in iter {
            if !set.kinds.contains(&kind) {
                set.kinds.push(kind);
                set.definitions.push(kind.definition());
            }
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Tool schema definitions
// ---------------------------------------------------------------------------

fn def_search() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::Search.name().to_string(),
        description: "Search the product catalog for items matching the user's request. \
                       Use when the user is looking for products, comparing items, or asking \
                       for recommendations (e.g. \"laptops under $1000\", \"a gaming monitor\"). \
                       Price, rating, sale and category constraints can be stated in the query."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural language description of what the user wants."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

fn def_send_email() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::SendEmail.name().to_string(),
        description: "Email a product's details to the user. The user's address is already \
                       known. Use the product SKU from search results or conversation context."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "product_id": {
                    "type": "string",
                    "description": "SKU of the product to email."
                }
            },
            "required": ["product_id"],
            "additionalProperties": false
        }),
    }
}

fn def_purchase() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::Purchase.name().to_string(),
        description: "Place an order for a product when the user wants to buy it \
                       (\"I'll take it\", \"order that laptop\"). Use the product SKU from \
                       search results or conversation context."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "product_id": {
                    "type": "string",
                    "description": "SKU of the product to purchase."
                }
            },
            "required": ["product_id"],
            "additionalProperties": false
        }),
    }
}

fn def_account_info() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::AccountInfo.name().to_string(),
        description: "Get the current user's account information: name, email, and phone."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

fn def_purchase_history() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::PurchaseHistory.name().to_string(),
        description: "Get the user's past orders (\"what have I bought before?\", \
                       \"show me my orders\")."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of orders to list. Defaults to 5.",
                    "minimum": 1
                }
            },
            "additionalProperties": false
        }),
    }
}

fn def_web_search() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::WebSearch.name().to_string(),
        description: "Search the web for current information such as weather, news, sports, \
                       or time. Do NOT use this for product searches."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to look up."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("search", Some(ToolKind::Search))]
    #[test_case("search_products", Some(ToolKind::Search))]
    #[test_case("send_product_email", Some(ToolKind::SendEmail))]
    #[test_case("purchase_product", Some(ToolKind::Purchase))]
    #[test_case("get_user_info", Some(ToolKind::AccountInfo))]
    #[test_case("get_purchase_history", Some(ToolKind::PurchaseHistory))]
    #[test_case("search_web", Some(ToolKind::WebSearch))]
    #[test_case("delete_account", None)]
    fn test_from_name(name: &str, expected: Option<ToolKind>) {
        assert_eq!(ToolKind::from_name(name), expected);
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.definition().name, kind.name());
        }
    }

    #[test]
    fn test_toolset_omits_web_search_when_unavailable() {
        let without = ToolSet::for_turn(false);
        assert_eq!(without.len(), 5);
        assert!(!without.contains(ToolKind::WebSearch));

        let with = ToolSet::for_turn(true);
        assert_eq!(with.len(), 6);
        assert!(with.contains(ToolKind::WebSearch));
    }

    #[test]
    fn test_all_definitions_have_valid_schemas() {
        for def in ToolSet::for_turn(true).definitions() {
            assert!(!def.description.is_empty());
            assert_eq!(def.parameters["type"], "object");
        }
    }

    #[test]
    fn test_parse_arguments() {
        let call = ToolCall::new("c1", "search", r#"{"query":"monitors"}"#);
        let args = call.parse_arguments().unwrap_or_default();
        assert_eq!(args.get("query").and_then(Value::as_str), Some("monitors"));

        assert!(ToolCall::new("c1", "account_info", "").parse_arguments().is_ok());
        assert!(ToolCall::new("c1", "search", "[1]").parse_arguments().is_err());
        assert!(ToolCall::new("c1", "search", "{oops").parse_arguments().is_err());
    }

    #[test]
    fn test_parse_arguments_rejects_oversized() {
        let big = format!(r#"{{"query":"{}"}}"#, "x".repeat(MAX_TOOL_ARGS_LEN));
        let err = ToolCall::new("c1", "search", &big).parse_arguments();
        assert!(matches!(err, Err(AgentError::ToolExecution { .. })));
    }

    #[test]
    fn test_tool_call_accepts_object_arguments() {
        let json = r#"{"id":"c1","name":"search","arguments":{"query":"tv"}}"#;
        let call: ToolCall = serde_json::from_str(json).unwrap_or_else(|_| unreachable!());
        assert_eq!(call.arguments, r#"{"query":"tv"}"#);
    }

    #[test]
    fn test_tool_result_defaults() {
        let json = r#"{"tool_call_id":"c1","name":"search","content":"hi"}"#;
        let result: ToolResult = serde_json::from_str(json).unwrap_or_else(|_| unreachable!());
        assert_eq!(result.tool_name, "search");
        assert_eq!(result.status, ToolStatus::Success);
        assert!(result.payload.is_none());
        assert!(!result.is_error());
    }
}
