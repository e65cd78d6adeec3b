//! Test doubles shared by the agent test modules.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::executor::ToolExecutor;
use super::message::{ChatMessage, ChatRequest, ChatResponse, TokenUsage};
use super::provider::LlmProvider;
use super::retrieval::RetrievalAdapter;
use super::tool::{ToolCall, ToolSet};
use crate::core::item::tests::item;
use crate::core::{Item, UserProfile};
use crate::error::AgentError;
use crate::memory::{Backends, Fixture};
use crate::services::RetrievalBackend;

/// A final text response.
pub(crate) fn text_response(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.to_string(),
        usage: TokenUsage::default(),
        tool_calls: Vec::new(),
        finish_reason: Some("stop".to_string()),
    }
}

/// A response requesting `calls`.
pub(crate) fn tool_response(calls: Vec<ToolCall>) -> ChatResponse {
    ChatResponse {
        content: String::new(),
        usage: TokenUsage::default(),
        tool_calls: calls,
        finish_reason: Some("tool_calls".to_string()),
    }
}

/// Provider that replays a fixed script and records every request.
///
/// Once the script is exhausted it keeps answering with plain text.
pub(crate) struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ChatResponse, AgentError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Duration,
}

impl ScriptedProvider {
    pub(crate) fn new(script: Vec<ChatResponse>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn failing(error: AgentError) -> Self {
        let provider = Self::new(Vec::new());
        if let Ok(mut script) = provider.script.lock() {
            script.push_back(Err(error));
        }
        provider
    }

    /// Sleeps before every response.
    pub(crate) const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(text_response("Done.")))
    }
}

/// Retrieval backend answering from a fixed query table and counting calls.
#[derive(Default)]
pub(crate) struct CountingBackend {
    answers: HashMap<String, Vec<Item>>,
    fail: bool,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
    last: Mutex<Option<(usize, Vec<String>)>>,
}

impl CountingBackend {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Answers `query` with items built from `ids`.
    pub(crate) fn with(mut self, query: &str, ids: &[&str]) -> Self {
        self.answers.insert(
            query.to_string(),
            ids.iter().map(|id| item(id, &format!("Item {id}"))).collect(),
        );
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub(crate) fn last_vocabulary(&self) -> Vec<String> {
        self.last
            .lock()
            .ok()
            .and_then(|l| l.as_ref().map(|(_, v)| v.clone()))
            .unwrap_or_default()
    }

    pub(crate) fn last_k(&self) -> Option<usize> {
        self.last.lock().ok().and_then(|l| l.as_ref().map(|(k, _)| *k))
    }
}

#[async_trait]
impl RetrievalBackend for CountingBackend {
    async fn decompose_and_search(
        &self,
        query: &str,
        k: usize,
        vocabulary: &[String],
    ) -> Result<Vec<Item>, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.to_string());
        }
        if let Ok(mut last) = self.last.lock() {
            *last = Some((k, vocabulary.to_vec()));
        }
        if self.fail {
            return Err(AgentError::upstream("retrieval", "connection refused"));
        }
        Ok(self
            .answers
            .get(query)
            .map(|items| items.iter().take(k).cloned().collect())
            .unwrap_or_default())
    }
}

/// The user most tests run as.
pub(crate) fn jane() -> UserProfile {
    UserProfile {
        id: "user_0042".to_string(),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        email: "jane@example.com".to_string(),
        phone: "+14165550100".to_string(),
    }
}

/// Store fixture with Jane and one monitor (`P1`).
pub(crate) fn fixture() -> Fixture {
    Fixture {
        products: vec![item("P1", "Gaming Monitor")],
        users: vec![jane()],
        ..Fixture::default()
    }
}

/// Executor for Jane over [`fixture`], searching through `backend`.
pub(crate) fn executor(backend: Arc<CountingBackend>) -> ToolExecutor {
    let backends = Backends::from_fixture(fixture());
    let retrieval = RetrievalAdapter::new(backend, backends.vocabulary.clone(), 5);
    ToolExecutor::new(
        jane(),
        backends.services(),
        retrieval,
        ToolSet::for_turn(false),
        Duration::from_secs(1),
        5,
    )
}

/// A request carrying `messages` and no tools.
pub(crate) fn request(messages: Vec<ChatMessage>) -> ChatRequest {
    ChatRequest {
        model: "test".to_string(),
        messages,
        temperature: Some(0.0),
        max_tokens: Some(256),
        json_mode: false,
        tools: Vec::new(),
    }
}
