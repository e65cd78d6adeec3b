//! Turn orchestrator.
//!
//! Wires one request/response cycle: validate the query, resolve the user,
//! build the system prompt, bind the tools, run the agentic loop, and
//! reconcile the finished history into a [`TurnResult`]. Every failure
//! along the way, including the per-turn timeout, becomes a fallback result
//! tagged [`Source::None`](crate::core::Source::None).
//!
//! [`Orchestrator::execute_action`] runs a single email or purchase for a
//! product without involving the model.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::action::{ActionDetails, ActionFailure, ActionKind, ActionOutcome};
use super::agentic_loop::agentic_loop;
use super::config::AgentConfig;
use super::message::{ChatMessage, ChatRequest, Role, system_message, user_message};
use super::prompt::{ShownProduct, build_chat_prompt};
use super::provider::LlmProvider;
use super::reconciler::ResultReconciler;
use super::registry::ToolRegistry;
use super::retrieval::RetrievalAdapter;
use super::tool::{ToolCall, ToolStatus};
use super::turn::{FALLBACK_REPLY, TurnResult};
use crate::core::UserProfile;
use crate::error::AgentError;
use crate::services::Services;

/// Maximum user query length, in characters.
pub const MAX_QUERY_CHARS: usize = 1_000;
/// Previously shown products named in the system prompt.
const CONTEXT_PRODUCTS: usize = 3;

/// State carried over from earlier turns of the conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorContext {
    /// Earlier messages, oldest first. System messages are dropped on replay.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Ids of the products shown in the previous turn.
    #[serde(default)]
    pub last_item_ids: Vec<String>,
}

/// Runs conversation turns.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
    services: Services,
    registry: ToolRegistry,
    reconciler: ResultReconciler,
}

impl Orchestrator {
    /// Creates an orchestrator. Searches (from tools and compensation) go
    /// through `retrieval`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: AgentConfig,
        services: Services,
        retrieval: RetrievalAdapter,
    ) -> Self {
        let registry = ToolRegistry::new(services.clone(), retrieval.clone(), &config);
        Self {
            provider,
            config,
            services,
            registry,
            reconciler: ResultReconciler::new(retrieval),
        }
    }

    /// Processes one user message. Never fails.
    pub async fn process_turn(
        &self,
        query: &str,
        user_id: &str,
        prior: Option<PriorContext>,
    ) -> TurnResult {
        let start = Instant::now();
        let budget = self.config.turn_timeout;

        let outcome = match tokio::time::timeout(budget, self.run_turn(query, user_id, prior)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::TurnTimeout { timeout: budget }),
        };

        match outcome {
            Ok(result) => {
                info!(
                    user_id,
                    source = %result.source(),
                    products = result.products().len(),
                    elapsed_ms = start.elapsed().as_millis(),
                    "turn complete"
                );
                result
            }
            Err(e) => {
                warn!(user_id, error = %e, elapsed_ms = start.elapsed().as_millis(), "turn failed, sending fallback");
                TurnResult::fallback(fallback_message(&e))
            }
        }
    }

    async fn run_turn(
        &self,
        query: &str,
        user_id: &str,
        prior: Option<PriorContext>,
    ) -> Result<TurnResult, AgentError> {
        let query = validate_query(query)?;
        let user = self.services.identity.get_user(user_id).await?;
        let prior = prior.unwrap_or_default();

        let system = self.system_prompt(&user, &prior.last_item_ids).await;
        let executor = self.registry.bind(user).await;

        let mut messages = Vec::with_capacity(prior.messages.len() + 2);
        messages.push(system_message(&system));
        messages.extend(
            prior
                .messages
                .into_iter()
                .filter(|m| m.role() != Role::System),
        );
        messages.push(user_message(query));

        let mut request = ChatRequest {
            model: self.config.chat_model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            json_mode: false,
            tools: executor.tools().definitions().to_vec(),
        };

        let summary = agentic_loop(
            self.provider.as_ref(),
            &mut request,
            &executor,
            self.config.max_tool_iterations,
            self.config.parallel_tool_calls,
        )
        .await?;
        debug!(
            model_calls = summary.model_calls,
            tool_calls = summary.tool_calls,
            total_tokens = summary.usage.total_tokens,
            hit_limit = summary.hit_limit,
            "loop finished"
        );

        Ok(self.reconciler.reconcile(&request.messages).await)
    }

    /// Runs `action` on `item_id` for `user_id`. Never fails.
    ///
    /// Unknown users and items come back as unsuccessful outcomes with a
    /// [`ActionFailure`] class; so do transport failures and timeouts.
    pub async fn execute_action(
        &self,
        action: ActionKind,
        item_id: &str,
        user_id: &str,
    ) -> ActionOutcome {
        let budget = self.config.turn_timeout;
        let outcome = match tokio::time::timeout(budget, self.run_action(action, item_id, user_id))
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => action_failure(&e, item_id),
            Err(_) => action_failure(&AgentError::TurnTimeout { timeout: budget }, item_id),
        };
        info!(
            user_id,
            item_id,
            %action,
            success = outcome.success,
            "action complete"
        );
        outcome
    }

    async fn run_action(
        &self,
        action: ActionKind,
        item_id: &str,
        user_id: &str,
    ) -> Result<ActionOutcome, AgentError> {
        let item_id = item_id.trim();
        let user = self.services.identity.get_user(user_id).await?;
        self.services.products.get_item(item_id).await?;

        let executor = self.registry.bind(user).await;
        let tool = action.tool();
        let arguments = serde_json::json!({ "product_id": item_id }).to_string();
        let result = executor
            .execute(&ToolCall::new(&format!("action-{action}"), tool.name(), &arguments))
            .await;

        if result.status != ToolStatus::Success {
            return Ok(ActionOutcome::failed(
                ActionFailure::ActionFailed,
                result.content,
            ));
        }
        let details = result.payload.and_then(|p| {
            serde_json::from_value::<ActionDetails>(p)
                .map_err(|e| warn!(%action, error = %e, "action payload unusable"))
                .ok()
        });
        Ok(ActionOutcome::completed(result.content, details))
    }

    async fn system_prompt(&self, user: &UserProfile, last_item_ids: &[String]) -> String {
        let ids: Vec<&str> = last_item_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
            .take(CONTEXT_PRODUCTS)
            .collect();

        let mut names = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.services.products.get_item(id).await {
                Ok(item) => names.push(Some(item.name)),
                Err(e) => {
                    debug!(item_id = id, error = %e, "context product not resolved");
                    names.push(None);
                }
            }
        }

        let shown: Vec<ShownProduct<'_>> = ids
            .iter()
            .copied()
            .zip(&names)
            .map(|(id, name)| ShownProduct {
                id,
                name: name.as_deref(),
            })
            .collect();
        build_chat_prompt(user.greeting_name(), &shown)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("chat_model", &self.config.chat_model)
            .field("turn_timeout", &self.config.turn_timeout)
            .finish_non_exhaustive()
    }
}

/// Trims `query` and checks its length.
///
/// # Errors
///
/// [`AgentError::InvalidQuery`] when blank or longer than
/// [`MAX_QUERY_CHARS`]; the message is meant for the user.
pub fn validate_query(query: &str) -> Result<&str, AgentError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(AgentError::InvalidQuery {
            message: "Please type a message so I can help you.".to_string(),
        });
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return Err(AgentError::InvalidQuery {
            message: format!(
                "Your message is too long. Please keep it under {MAX_QUERY_CHARS} characters."
            ),
        });
    }
    Ok(trimmed)
}

fn action_failure(err: &AgentError, item_id: &str) -> ActionOutcome {
    match err {
        AgentError::NotFound { kind: "user", .. } => ActionOutcome::failed(
            ActionFailure::UserNotFound,
            "I couldn't find your account. Please sign in again and retry.",
        ),
        AgentError::NotFound { .. } => ActionOutcome::failed(
            ActionFailure::ProductNotFound,
            format!("Product '{item_id}' not found."),
        ),
        other => ActionOutcome::failed(ActionFailure::ActionFailed, fallback_message(other)),
    }
}

fn fallback_message(err: &AgentError) -> String {
    match err {
        AgentError::InvalidQuery { message } => message.clone(),
        AgentError::NotFound { kind: "user", .. } => {
            "I couldn't find your account. Please sign in again and retry.".to_string()
        }
        AgentError::TurnTimeout { .. } => {
            "I'm sorry, that took longer than expected. Please try again in a moment.".to_string()
        }
        _ => FALLBACK_REPLY.to_string(),
    }
}
