//! Agentic tool-calling loop.
//!
//! Drives the LLM ↔ tool execution round-trip as a three-state machine:
//! [`LoopState::AwaitModel`] asks the model for the next message,
//! [`LoopState::ExecuteTools`] answers the tool calls it requested, and
//! [`LoopState::Finalize`] ends the turn. The next state is always a pure
//! function of the last message in the history (see [`route`]).

use tracing::{debug, warn};

use super::executor::ToolExecutor;
use super::message::{ChatMessage, ChatRequest, TokenUsage, assistant_message, tool_message};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Reply appended when the model keeps calling tools past the limit.
pub const ITERATION_LIMIT_REPLY: &str = "I'm sorry, I wasn't able to finish that request. \
                                         Could you try asking in a different way?";

/// Loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the next assistant message.
    AwaitModel,
    /// The last assistant message requested tools.
    ExecuteTools,
    /// The last assistant message is the final answer.
    Finalize,
}

/// Picks the next state from the last history message.
///
/// An assistant message with tool calls leads to [`LoopState::ExecuteTools`],
/// one without leads to [`LoopState::Finalize`]; anything else (system, user
/// or tool messages, or an empty history) needs the model.
#[must_use]
pub fn route(last: Option<&ChatMessage>) -> LoopState {
    match last {
        Some(ChatMessage::Assistant { tool_calls, .. }) if !tool_calls.is_empty() => {
            LoopState::ExecuteTools
        }
        Some(ChatMessage::Assistant { .. }) => LoopState::Finalize,
        _ => LoopState::AwaitModel,
    }
}

/// Bookkeeping from one loop run.
#[derive(Debug, Clone, Default)]
pub struct LoopSummary {
    /// Model calls made.
    pub model_calls: usize,
    /// Tool calls executed.
    pub tool_calls: usize,
    /// Token usage summed over every model call.
    pub usage: TokenUsage,
    /// Whether the iteration limit cut the loop short.
    pub hit_limit: bool,
}

/// Runs the loop until the model answers without tool calls.
///
/// `request.messages` is the turn history: each model call appends exactly
/// one assistant message, and each tool round appends one tool message per
/// call in call order. After `max_iterations` model calls the loop appends
/// [`ITERATION_LIMIT_REPLY`] and finalizes.
///
/// # Errors
///
/// Propagates provider errors. Tool failures never surface here.
pub async fn agentic_loop(
    provider: &dyn LlmProvider,
    request: &mut ChatRequest,
    executor: &ToolExecutor,
    max_iterations: usize,
    parallel: bool,
) -> Result<LoopSummary, AgentError> {
    let mut summary = LoopSummary::default();

    loop {
        match route(request.messages.last()) {
            LoopState::AwaitModel => {
                if summary.model_calls >= max_iterations {
                    warn!(max_iterations, "tool loop limit reached, finalizing");
                    summary.hit_limit = true;
                    request.messages.push(assistant_message(ITERATION_LIMIT_REPLY));
                    continue;
                }
                let response = provider.chat(request).await?;
                summary.model_calls += 1;
                summary.usage.prompt_tokens += response.usage.prompt_tokens;
                summary.usage.completion_tokens += response.usage.completion_tokens;
                summary.usage.total_tokens += response.usage.total_tokens;
                debug!(
                    iteration = summary.model_calls,
                    tool_count = response.tool_calls.len(),
                    finish_reason = response.finish_reason.as_deref().unwrap_or(""),
                    "model responded"
                );
                request.messages.push(ChatMessage::Assistant {
                    content: response.content,
                    tool_calls: response.tool_calls,
                });
            }
            LoopState::ExecuteTools => {
                let calls = request
                    .messages
                    .last()
                    .map(|m| m.tool_calls().to_vec())
                    .unwrap_or_default();
                let results = executor.execute_all(&calls, parallel).await;
                summary.tool_calls += results.len();
                request.messages.extend(results.into_iter().map(tool_message));
            }
            LoopState::Finalize => {
                debug!(
                    model_calls = summary.model_calls,
                    tool_calls = summary.tool_calls,
                    "agentic loop completed"
                );
                return Ok(summary);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::{
        assistant_tool_calls_message, system_message, user_message,
    };
    use crate::agent::testing::{
        CountingBackend, ScriptedProvider, executor, request, text_response, tool_response,
    };
    use crate::agent::tool::{ToolCall, ToolResult};
    use std::sync::Arc;
    use test_case::test_case;

    fn seed() -> Vec<ChatMessage> {
        vec![system_message("You are a test agent."), user_message("monitors please")]
    }

    fn search_call(id: &str, query: &str) -> ToolCall {
        ToolCall::new(id, "search", &format!(r#"{{"query":"{query}"}}"#))
    }

    #[test_case(None, LoopState::AwaitModel; "empty history")]
    #[test_case(Some(user_message("hi")), LoopState::AwaitModel; "user")]
    #[test_case(Some(tool_message(ToolResult::text("c1", "search", "x"))), LoopState::AwaitModel; "tool result")]
    #[test_case(Some(assistant_message("done")), LoopState::Finalize; "final answer")]
    #[test_case(Some(assistant_tool_calls_message(vec![ToolCall::new("c1", "search", "{}")])), LoopState::ExecuteTools; "tool calls")]
    fn test_route(last: Option<ChatMessage>, expected: LoopState) {
        assert_eq!(route(last.as_ref()), expected);
    }

    #[tokio::test]
    async fn test_single_tool_round() {
        let backend = Arc::new(CountingBackend::default().with("monitors", &["A"]));
        let exec = executor(backend.clone());
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![search_call("c1", "monitors")]),
            text_response("Here is a monitor."),
        ]);
        let mut req = request(seed());

        let summary = agentic_loop(&provider, &mut req, &exec, 8, true)
            .await
            .unwrap_or_else(|e| panic!("loop failed: {e}"));

        // system + user + assistant(calls) + tool + assistant(final)
        assert_eq!(req.messages.len(), 5);
        assert_eq!(summary.model_calls, 2);
        assert_eq!(summary.tool_calls, 1);
        assert!(!summary.hit_limit);
        assert_eq!(req.messages[4].content(), "Here is a monitor.");
        assert_eq!(backend.calls(), 1);

        // The second model call saw the tool result.
        let requests = provider.requests();
        assert_eq!(requests[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn test_no_tools_finalizes_after_one_call() {
        let exec = executor(Arc::default());
        let provider = ScriptedProvider::new(vec![text_response("Hello!")]);
        let mut req = request(seed());

        let summary = agentic_loop(&provider, &mut req, &exec, 8, true)
            .await
            .unwrap_or_else(|e| panic!("loop failed: {e}"));
        assert_eq!(summary.model_calls, 1);
        assert_eq!(req.messages.len(), 3);
    }

    #[tokio::test]
    async fn test_results_follow_call_order() {
        let backend = Arc::new(
            CountingBackend::default()
                .with("monitors", &["A"])
                .with("keyboards", &["K"]),
        );
        let exec = executor(backend);
        let provider = ScriptedProvider::new(vec![tool_response(vec![
            search_call("c1", "monitors"),
            ToolCall::new("c2", "account_info", "{}"),
            search_call("c3", "keyboards"),
        ])]);
        let mut req = request(seed());

        let _ = agentic_loop(&provider, &mut req, &exec, 8, true).await;
        let ids: Vec<&str> = req
            .messages
            .iter()
            .filter_map(|m| match m {
                ChatMessage::Tool(r) => Some(r.tool_call_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_iteration_limit_apologizes() {
        let exec = executor(Arc::default());
        let provider = ScriptedProvider::new(
            (0..5)
                .map(|i| tool_response(vec![search_call(&format!("c{i}"), "loop")]))
                .collect(),
        );
        let mut req = request(seed());

        let summary = agentic_loop(&provider, &mut req, &exec, 2, false)
            .await
            .unwrap_or_else(|e| panic!("loop failed: {e}"));
        assert!(summary.hit_limit);
        assert_eq!(summary.model_calls, 2);
        assert_eq!(provider.requests().len(), 2);
        assert_eq!(
            req.messages.last().map(ChatMessage::content),
            Some(ITERATION_LIMIT_REPLY)
        );
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let exec = executor(Arc::default());
        let provider = ScriptedProvider::failing(AgentError::ApiRequest {
            message: "boom".to_string(),
            status: Some(500),
        });
        let mut req = request(seed());

        let result = agentic_loop(&provider, &mut req, &exec, 8, true).await;
        assert!(matches!(result, Err(AgentError::ApiRequest { .. })));
    }
}
