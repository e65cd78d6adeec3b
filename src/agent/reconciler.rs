//! Result reconciler.
//!
//! Walks a finished turn history once and derives the [`TurnResult`]:
//!
//! 1. Index the turn's tool calls by id and record the search queries issued,
//!    in order, once per distinct query text.
//! 2. Absorb each tool result in history order. Search payloads are merged
//!    into an id-unique item set (first occurrence wins) and resolve their
//!    query; provenance and auxiliary data come from the other tool families.
//! 3. Re-run every search query that no usable payload resolved, exactly
//!    once, through the retrieval adapter.
//! 4. A turn without tool calls is tagged [`Source::Chat`].
//!
//! The turn starts at the last user message; earlier messages replayed from
//! prior turns are ignored. Steps 1, 2 and 4 are pure ([`Reconciliation`]);
//! only step 3 touches the network.

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::executor::ToolInvocation;
use super::message::{ChatMessage, Role};
use super::retrieval::RetrievalAdapter;
use super::tool::{ToolCall, ToolKind, ToolResult, ToolStatus};
use super::turn::TurnResult;
use crate::core::{AccountInfo, Item, ItemSet, Order, Source};
use crate::error::AgentError;

/// Reply used when the turn ended without assistant text.
pub const NO_REPLY_FALLBACK: &str = "I apologize, but I couldn't generate a response.";

/// Provenance accumulator.
///
/// The last success wins. "Nothing found" only lands while no success has
/// been recorded, so a success is never downgraded to [`Source::None`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvenanceTracker {
    current: Option<Source>,
}

impl ProvenanceTracker {
    /// Records a successful tool outcome. Ignores [`Source::None`].
    pub fn record_success(&mut self, source: Source) {
        if source.is_success() {
            self.current = Some(source);
        }
    }

    /// Records an empty or failed outcome.
    pub fn record_empty(&mut self) {
        if !self.has_success() {
            self.current = Some(Source::None);
        }
    }

    /// Records `source` only if nothing has succeeded yet.
    pub fn record_fallback(&mut self, source: Source) {
        if !self.has_success() {
            self.record_success(source);
        }
    }

    /// Returns `true` once any success has been recorded.
    #[must_use]
    pub fn has_success(&self) -> bool {
        self.current.is_some_and(Source::is_success)
    }

    /// The current tag, if anything was recorded.
    #[must_use]
    pub const fn current(&self) -> Option<Source> {
        self.current
    }
}

/// The pure part of reconciliation: everything derivable from the history
/// alone, plus the list of search queries still needing a retrieval call.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    reply: String,
    items: ItemSet,
    provenance: ProvenanceTracker,
    has_results: bool,
    account_info: Option<AccountInfo>,
    order_history: Option<Vec<Order>>,
    pending: Vec<String>,
    tools_called: bool,
}

impl Reconciliation {
    /// Scans the current turn of `history`.
    #[must_use]
    pub fn scan(history: &[ChatMessage]) -> Self {
        let start = history
            .iter()
            .rposition(|m| m.role() == Role::User)
            .unwrap_or(0);
        let turn = &history[start..];

        let mut calls: HashMap<&str, &ToolCall> = HashMap::new();
        let mut issued: Vec<String> = Vec::new();
        for call in turn.iter().flat_map(ChatMessage::tool_calls) {
            calls.insert(call.id.as_str(), call);
            if let Some(query) = search_query(call)
                && !issued.contains(&query)
            {
                issued.push(query);
            }
        }

        let mut rec = Self {
            reply: final_reply(turn),
            items: ItemSet::new(),
            provenance: ProvenanceTracker::default(),
            has_results: false,
            account_info: None,
            order_history: None,
            pending: Vec::new(),
            tools_called: !calls.is_empty(),
        };

        let mut resolved: HashSet<String> = HashSet::new();
        for message in turn {
            if let ChatMessage::Tool(result) = message {
                rec.tools_called = true;
                let call = calls.get(result.tool_call_id.as_str()).copied();
                rec.absorb(result, call, &mut resolved);
            }
        }

        rec.pending = issued
            .into_iter()
            .filter(|q| !resolved.contains(q))
            .collect();
        rec
    }

    /// Search queries that still need a compensating retrieval call.
    #[must_use]
    pub fn pending_queries(&self) -> &[String] {
        &self.pending
    }

    /// Merges the items of a compensating retrieval call.
    pub fn merge_retrieved(&mut self, items: Vec<Item>) {
        if items.is_empty() {
            return;
        }
        self.items.merge(items);
        self.has_results = true;
        self.provenance.record_fallback(Source::Search);
    }

    /// Builds the final result.
    #[must_use]
    pub fn finish(self) -> TurnResult {
        let source = if self.tools_called {
            self.provenance.current().unwrap_or(Source::None)
        } else {
            Source::Chat
        };
        TurnResult::new(
            self.reply,
            self.items.into_vec(),
            self.has_results,
            source,
            self.account_info,
            self.order_history,
        )
    }

    fn absorb(
        &mut self,
        result: &ToolResult,
        call: Option<&ToolCall>,
        resolved: &mut HashSet<String>,
    ) {
        let Some(kind) = ToolKind::from_name(&result.tool_name).or_else(|| call.and_then(ToolCall::kind))
        else {
            warn!(tool = %result.tool_name, call_id = %result.tool_call_id, "result from unknown tool ignored");
            return;
        };

        match (kind, result.status) {
            (ToolKind::Search, ToolStatus::Success) => match decode::<Vec<Item>>(result) {
                Ok(items) => {
                    if let Some(query) = call.and_then(search_query) {
                        resolved.insert(query);
                    }
                    if items.is_empty() {
                        self.provenance.record_empty();
                    } else {
                        self.items.merge(items);
                        self.provenance.record_success(kind.success_source());
                        self.has_results = true;
                    }
                }
                Err(e) => {
                    warn!(call_id = %result.tool_call_id, error = %e, "search payload unusable, query will be re-run");
                }
            },
            (ToolKind::SendEmail | ToolKind::Purchase, ToolStatus::Success) => {
                self.provenance.record_success(kind.success_source());
                self.has_results = true;
            }
            (ToolKind::AccountInfo, ToolStatus::Success) => {
                self.provenance.record_success(kind.success_source());
                self.has_results = true;
                match decode::<AccountInfo>(result) {
                    Ok(info) => self.account_info = Some(info),
                    Err(e) => warn!(call_id = %result.tool_call_id, error = %e, "account payload unusable"),
                }
            }
            (ToolKind::PurchaseHistory, ToolStatus::Success) => {
                self.provenance.record_success(kind.success_source());
                self.has_results = true;
                match decode::<Vec<Order>>(result) {
                    Ok(orders) => self.order_history = Some(orders),
                    Err(e) => warn!(call_id = %result.tool_call_id, error = %e, "order payload unusable"),
                }
            }
            (ToolKind::PurchaseHistory, ToolStatus::NoMatches) => {
                self.provenance.record_success(kind.success_source());
                self.order_history.get_or_insert_with(Vec::new);
            }
            (ToolKind::WebSearch, ToolStatus::Success) => {
                self.provenance.record_success(kind.success_source());
                self.has_results = true;
            }
            (_, status) => {
                debug!(tool = kind.name(), call_id = %result.tool_call_id, ?status, "tool produced nothing");
                self.provenance.record_empty();
            }
        }
    }
}

/// Derives [`TurnResult`]s from finished histories.
#[derive(Debug, Clone)]
pub struct ResultReconciler {
    retrieval: RetrievalAdapter,
}

impl ResultReconciler {
    /// Creates a reconciler that re-runs unresolved searches through
    /// `retrieval`.
    #[must_use]
    pub const fn new(retrieval: RetrievalAdapter) -> Self {
        Self { retrieval }
    }

    /// Reconciles `history` into a result. Never fails: retrieval errors
    /// during compensation count as zero items.
    pub async fn reconcile(&self, history: &[ChatMessage]) -> TurnResult {
        let mut rec = Reconciliation::scan(history);
        let pending = rec.pending_queries().to_vec();
        for query in &pending {
            info!(query, "compensating retrieval for unresolved search");
            let items = self.retrieval.decompose_and_search(query).await;
            rec.merge_retrieved(items);
        }
        let result = rec.finish();
        debug!(
            source = %result.source(),
            products = result.products().len(),
            has_results = result.has_results(),
            retries = pending.len(),
            "turn reconciled"
        );
        result
    }
}

fn search_query(call: &ToolCall) -> Option<String> {
    if call.kind() != Some(ToolKind::Search) {
        return None;
    }
    match ToolInvocation::parse(ToolKind::Search, call) {
        Ok(ToolInvocation::Search { query }) => Some(query),
        _ => None,
    }
}

fn final_reply(turn: &[ChatMessage]) -> String {
    turn.iter()
        .rev()
        .find_map(|m| match m {
            ChatMessage::Assistant { content, .. } if !content.trim().is_empty() => {
                Some(content.clone())
            }
            _ => None,
        })
        .unwrap_or_else(|| NO_REPLY_FALLBACK.to_string())
}

fn decode<T: DeserializeOwned>(result: &ToolResult) -> Result<T, AgentError> {
    let malformed = |message: String| AgentError::MalformedToolOutput {
        tool: result.tool_name.clone(),
        message,
    };
    let payload = result
        .payload
        .as_ref()
        .ok_or_else(|| malformed("no payload attached".to_string()))?;
    serde_json::from_value(payload.clone()).map_err(|e| malformed(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::{
        assistant_message, assistant_tool_calls_message, system_message, tool_message,
        user_message,
    };
    use crate::agent::testing::CountingBackend;
    use crate::core::item::tests::item;
    use proptest::prelude::*;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn search_call(id: &str, query: &str) -> ToolCall {
        ToolCall::new(id, "search", &json!({ "query": query }).to_string())
    }

    fn payload(ids: &[&str]) -> Value {
        let items: Vec<Item> = ids.iter().map(|id| item(id, &format!("Item {id}"))).collect();
        serde_json::to_value(items).unwrap_or_default()
    }

    fn search_result(id: &str, ids: &[&str]) -> ChatMessage {
        tool_message(
            ToolResult::text(id, "search", format!("Found {} products:", ids.len()))
                .with_payload(payload(ids)),
        )
    }

    fn status_result(id: &str, tool: &str, status: ToolStatus) -> ChatMessage {
        tool_message(ToolResult::text(id, tool, "text").with_status(status))
    }

    fn turn(calls: Vec<ToolCall>, results: Vec<ChatMessage>, reply: &str) -> Vec<ChatMessage> {
        let mut history = vec![system_message("sys"), user_message("hi")];
        history.push(assistant_tool_calls_message(calls));
        history.extend(results);
        history.push(assistant_message(reply));
        history
    }

    fn reconciler(backend: &Arc<CountingBackend>) -> ResultReconciler {
        ResultReconciler::new(RetrievalAdapter::new(backend.clone(), Arc::default(), 5))
    }

    fn ids(result: &TurnResult) -> Vec<&str> {
        result.products().iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_tracker_never_downgrades() {
        let mut tracker = ProvenanceTracker::default();
        tracker.record_empty();
        assert_eq!(tracker.current(), Some(Source::None));
        tracker.record_success(Source::Search);
        tracker.record_empty();
        assert_eq!(tracker.current(), Some(Source::Search));
        tracker.record_success(Source::Action);
        assert_eq!(tracker.current(), Some(Source::Action));
        tracker.record_fallback(Source::Search);
        assert_eq!(tracker.current(), Some(Source::Action));
        tracker.record_success(Source::None);
        assert_eq!(tracker.current(), Some(Source::Action));
    }

    #[tokio::test]
    async fn test_scenario_a_search_with_payload() {
        let backend = Arc::new(CountingBackend::default());
        let history = turn(
            vec![search_call("c1", "wireless earbuds")],
            vec![search_result("c1", &["E1", "E2", "E3"])],
            "Here are some earbuds.",
        );
        let result = reconciler(&backend).reconcile(&history).await;
        assert_eq!(result.source(), Source::Search);
        assert_eq!(result.products().len(), 3);
        assert!(result.has_results());
        assert_eq!(result.message(), "Here are some earbuds.");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_scenario_b_email_action() {
        let backend = Arc::new(CountingBackend::default());
        let history = turn(
            vec![ToolCall::new("c1", "send_email", r#"{"product_id":"P1"}"#)],
            vec![tool_message(ToolResult::text("c1", "send_email", "Done!"))],
            "Sent!",
        );
        let result = reconciler(&backend).reconcile(&history).await;
        assert_eq!(result.source(), Source::Action);
        assert!(result.products().is_empty());
        assert!(result.has_results());
    }

    #[tokio::test]
    async fn test_scenario_c_dedup_and_compensation() {
        let backend = Arc::new(CountingBackend::default().with("keyboards", &["A", "C"]));
        let malformed = tool_message(
            ToolResult::text("c2", "search", "Found 2 products:")
                .with_payload(Value::String("not a list".to_string())),
        );
        let history = turn(
            vec![search_call("c1", "monitors"), search_call("c2", "keyboards")],
            vec![search_result("c1", &["A", "B"]), malformed],
            "Monitors and keyboards.",
        );
        let result = reconciler(&backend).reconcile(&history).await;
        assert_eq!(ids(&result), vec!["A", "B", "C"]);
        assert_eq!(result.source(), Source::Search);
        assert_eq!(backend.queries(), vec!["keyboards"]);
    }

    #[tokio::test]
    async fn test_scenario_d_retrieval_down() {
        let backend = Arc::new(CountingBackend::failing());
        let history = turn(
            vec![search_call("c1", "monitors")],
            vec![status_result("c1", "search", ToolStatus::Failed)],
            "Sorry, search is down.",
        );
        let result = reconciler(&backend).reconcile(&history).await;
        assert_eq!(result.source(), Source::None);
        assert!(!result.has_results());
        assert!(result.products().is_empty());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_payload_is_retried_once_per_query() {
        let backend = Arc::new(CountingBackend::default().with("monitors", &["M1"]));
        let history = turn(
            vec![search_call("c1", "monitors"), search_call("c2", "monitors")],
            vec![
                tool_message(ToolResult::text("c1", "search", "Found 1 products:")),
                tool_message(ToolResult::text("c2", "search", "Found 1 products:")),
            ],
            "Monitors.",
        );
        let result = reconciler(&backend).reconcile(&history).await;
        assert_eq!(backend.calls(), 1);
        assert_eq!(ids(&result), vec!["M1"]);
        assert_eq!(result.source(), Source::Search);
        assert!(result.has_results());
    }

    #[tokio::test]
    async fn test_one_usable_payload_resolves_a_repeated_query() {
        let backend = Arc::new(CountingBackend::default().with("monitors", &["M1"]));
        let malformed = tool_message(
            ToolResult::text("c1", "search", "Found 1 products:")
                .with_payload(Value::String("bad".to_string())),
        );
        let history = turn(
            vec![search_call("c1", "monitors"), search_call("c2", "monitors")],
            vec![malformed, search_result("c2", &["A"])],
            "Monitors.",
        );
        let result = reconciler(&backend).reconcile(&history).await;
        assert_eq!(backend.calls(), 0);
        assert_eq!(ids(&result), vec!["A"]);
        assert_eq!(result.source(), Source::Search);
    }

    #[tokio::test]
    async fn test_no_tool_calls_is_chat() {
        let backend = Arc::new(CountingBackend::default());
        let history = vec![
            system_message("sys"),
            user_message("hello"),
            assistant_message("Hi there!"),
        ];
        let result = reconciler(&backend).reconcile(&history).await;
        assert_eq!(result.source(), Source::Chat);
        assert!(result.products().is_empty());
        assert!(!result.has_results());
    }

    #[tokio::test]
    async fn test_prior_turns_are_ignored() {
        let backend = Arc::new(CountingBackend::default());
        let mut history = turn(
            vec![search_call("c1", "monitors")],
            vec![search_result("c1", &["A"])],
            "Monitors.",
        );
        history.push(user_message("thanks"));
        history.push(assistant_message("You're welcome!"));

        let result = reconciler(&backend).reconcile(&history).await;
        assert_eq!(result.source(), Source::Chat);
        assert!(result.products().is_empty());
        assert_eq!(result.message(), "You're welcome!");
    }

    #[test]
    fn test_account_and_history_payloads() {
        let account = tool_message(
            ToolResult::text("c1", "account_info", "User Account Information:")
                .with_payload(json!({"name": "Jane Doe", "email": "jane@example.com", "phone": "555"})),
        );
        let history_result = tool_message(
            ToolResult::text("c2", "purchase_history", "You don't have any purchase history yet.")
                .with_status(ToolStatus::NoMatches)
                .with_payload(json!([])),
        );
        let history = turn(
            vec![
                ToolCall::new("c1", "account_info", "{}"),
                ToolCall::new("c2", "purchase_history", "{}"),
            ],
            vec![account, history_result],
            "Here are your details.",
        );
        let result = Reconciliation::scan(&history).finish();
        assert_eq!(result.source(), Source::History);
        assert_eq!(result.account_info().map(|a| a.name.as_str()), Some("Jane Doe"));
        assert_eq!(result.order_history().map(<[Order]>::len), Some(0));
        assert!(result.has_results());
    }

    #[test]
    fn test_legacy_names_reconcile() {
        let history = turn(
            vec![ToolCall::new("c1", "search_products", r#"{"query":"tv"}"#)],
            vec![tool_message(
                ToolResult::text("c1", "search_products", "Found 1 products:").with_payload(payload(&["T1"])),
            )],
            "A TV.",
        );
        let rec = Reconciliation::scan(&history);
        assert!(rec.pending_queries().is_empty());
        assert_eq!(rec.finish().source(), Source::Search);
    }

    #[test]
    fn test_empty_reply_uses_fallback() {
        let history = vec![user_message("hi"), assistant_message("  ")];
        assert_eq!(Reconciliation::scan(&history).finish().message(), NO_REPLY_FALLBACK);
    }

    /// One generated search step: the item ids its payload carries and
    /// whether the payload survives.
    fn search_steps() -> impl Strategy<Value = Vec<(Vec<u8>, bool)>> {
        prop::collection::vec(
            (prop::collection::vec(0u8..6, 0..5), any::<bool>()),
            1..6,
        )
    }

    fn steps_history(steps: &[(Vec<u8>, bool)]) -> Vec<ChatMessage> {
        let calls = (0..steps.len())
            .map(|i| search_call(&format!("c{i}"), &format!("query {i}")))
            .collect();
        let results = steps
            .iter()
            .enumerate()
            .map(|(i, (ids, valid))| {
                let id = format!("c{i}");
                let names: Vec<String> = ids.iter().map(|n| format!("P{n}")).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                if refs.is_empty() {
                    status_result(&id, "search", ToolStatus::NoMatches)
                } else if *valid {
                    search_result(&id, &refs)
                } else {
                    tool_message(ToolResult::text(&id, "search", "Found products:"))
                }
            })
            .collect();
        turn(calls, results, "done")
    }

    proptest! {
        #[test]
        fn prop_products_unique_in_first_seen_order(steps in search_steps()) {
            let history = steps_history(&steps);
            let result = Reconciliation::scan(&history).finish();

            let mut expected: Vec<String> = Vec::new();
            for (ids, valid) in &steps {
                if *valid {
                    for n in ids {
                        let id = format!("P{n}");
                        if !expected.contains(&id) {
                            expected.push(id);
                        }
                    }
                }
            }
            let got: Vec<String> = result.products().iter().map(|i| i.id.clone()).collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn prop_pending_only_for_unusable_payloads(steps in search_steps()) {
            let history = steps_history(&steps);
            let rec = Reconciliation::scan(&history);
            let expected: Vec<String> = steps
                .iter()
                .enumerate()
                .filter(|(_, (ids, valid))| ids.is_empty() || !*valid)
                .map(|(i, _)| format!("query {i}"))
                .collect();
            prop_assert_eq!(rec.pending_queries(), expected.as_slice());
        }

        #[test]
        fn prop_success_is_never_downgraded(
            outcomes in prop::collection::vec((0usize..6, 0usize..3), 1..8)
        ) {
            let names = ["send_email", "purchase", "account_info", "purchase_history", "web_search", "search"];
            let statuses = [ToolStatus::Success, ToolStatus::NoMatches, ToolStatus::Failed];
            let calls = outcomes
                .iter()
                .enumerate()
                .map(|(i, (tool, _))| ToolCall::new(&format!("c{i}"), names[*tool], "{}"))
                .collect();
            let results = outcomes
                .iter()
                .enumerate()
                .map(|(i, (tool, status))| {
                    let mut r = ToolResult::text(&format!("c{i}"), names[*tool], "text")
                        .with_status(statuses[*status]);
                    if names[*tool] == "search" {
                        r = r.with_payload(payload(&["S1"]));
                    }
                    tool_message(r)
                })
                .collect();
            let history = turn(calls, results, "done");
            let result = Reconciliation::scan(&history).finish();

            let any_success = outcomes.iter().any(|(tool, status)| {
                *status == 0 || (names[*tool] == "purchase_history" && *status == 1)
            });
            prop_assert_eq!(result.source() != Source::None, any_success);
        }

        #[test]
        fn prop_reconciliation_is_idempotent(steps in search_steps()) {
            let history = steps_history(&steps);
            let first = serde_json::to_string(&Reconciliation::scan(&history).finish()).unwrap_or_default();
            let second = serde_json::to_string(&Reconciliation::scan(&history).finish()).unwrap_or_default();
            prop_assert_eq!(first, second);
        }
    }
}
