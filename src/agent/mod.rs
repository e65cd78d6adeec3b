//! Agent core for the shopping assistant.
//!
//! Turns one user message into tool calls and a reply, then reconciles the
//! tool outputs into a provenance-tagged [`TurnResult`]. The language model
//! sits behind the [`LlmProvider`] abstraction, backed by OpenAI-compatible
//! APIs.
//!
//! # Architecture
//!
//! ```text
//! User query → Orchestrator
//!   ├── ToolRegistry::bind (user context, web search if available)
//!   ├── agentic_loop
//!   │   ├── AwaitModel   → LlmProvider::chat
//!   │   ├── ExecuteTools → ToolExecutor (search via RetrievalAdapter)
//!   │   └── Finalize
//!   └── ResultReconciler → TurnResult
//!       └── compensating retrieval for unresolved searches
//!
//! Product-card action → Orchestrator::execute_action
//!   └── ToolRegistry::bind → ToolExecutor (send_email | purchase) → ActionOutcome
//! ```
//!
//! # Feature Gate
//!
//! The OpenAI provider requires the `openai` feature (on by default):
//! ```toml
//! [dependencies]
//! shopkeep-rs = { version = "...", features = ["openai"] }
//! ```

pub mod action;
pub mod agentic_loop;
pub mod client;
pub mod config;
pub mod decomposer;
pub mod executor;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod reconciler;
pub mod registry;
pub mod retrieval;
pub mod tool;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use action::{ActionDetails, ActionFailure, ActionKind, ActionOutcome};
pub use agentic_loop::{LoopState, LoopSummary, agentic_loop, route};
pub use client::create_provider;
pub use config::AgentConfig;
pub use decomposer::LlmDecomposer;
pub use executor::{ToolExecutor, ToolInvocation};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{Orchestrator, PriorContext};
pub use provider::LlmProvider;
pub use reconciler::{ProvenanceTracker, Reconciliation, ResultReconciler};
pub use registry::ToolRegistry;
pub use retrieval::RetrievalAdapter;
pub use tool::{ToolCall, ToolDefinition, ToolKind, ToolResult, ToolSet, ToolStatus};
pub use turn::TurnResult;
