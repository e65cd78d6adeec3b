//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::time::Duration;

use crate::error::AgentError;

/// Default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
/// Default model for query decomposition.
const DEFAULT_DECOMPOSER_MODEL: &str = "gpt-4o-mini";
/// Default sampling temperature for the chat model.
const DEFAULT_TEMPERATURE: f32 = 0.3;
/// Default max tokens for chat responses.
const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Default max tokens for decomposition responses.
const DEFAULT_DECOMPOSER_MAX_TOKENS: u32 = 512;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default maximum model calls per turn.
const DEFAULT_MAX_TOOL_ITERATIONS: usize = 8;
/// Default hard per-turn budget in seconds.
const DEFAULT_TURN_TIMEOUT_SECS: u64 = 60;
/// Default budget for a single side-effecting tool call in seconds.
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 20;
/// Default number of items retrieved per search.
const DEFAULT_SEARCH_TOP_K: usize = 5;
/// Default number of orders listed by `purchase_history`.
const DEFAULT_HISTORY_PREVIEW_LIMIT: usize = 5;

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model driving the tool-calling loop.
    pub chat_model: String,
    /// Model used to decompose search queries into filters.
    pub decomposer_model: String,
    /// Sampling temperature for the chat model.
    pub temperature: f32,
    /// Maximum tokens for chat responses.
    pub max_tokens: u32,
    /// Maximum tokens for decomposition responses.
    pub decomposer_max_tokens: u32,
    /// Request timeout for provider calls.
    pub timeout: Duration,
    /// Maximum model calls in one turn before the loop gives up.
    pub max_tool_iterations: usize,
    /// Hard budget for a whole turn.
    pub turn_timeout: Duration,
    /// Budget for one email send. Expiry is reported, never retried.
    pub tool_timeout: Duration,
    /// Items retrieved per search call.
    pub search_top_k: usize,
    /// Default number of orders listed by `purchase_history`.
    pub history_preview_limit: usize,
    /// Run the tool calls of one model response concurrently.
    pub parallel_tool_calls: bool,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    chat_model: Option<String>,
    decomposer_model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    decomposer_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    max_tool_iterations: Option<usize>,
    turn_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    search_top_k: Option<usize>,
    history_preview_limit: Option<usize>,
    parallel_tool_calls: Option<bool>,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("SHOPKEEP_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("SHOPKEEP_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("SHOPKEEP_BASE_URL"))
                .ok();
        }
        if self.chat_model.is_none() {
            self.chat_model = std::env::var("SHOPKEEP_CHAT_MODEL").ok();
        }
        if self.decomposer_model.is_none() {
            self.decomposer_model = std::env::var("SHOPKEEP_DECOMPOSER_MODEL").ok();
        }
        if self.max_tool_iterations.is_none() {
            self.max_tool_iterations = env_parse("SHOPKEEP_MAX_TOOL_ITERATIONS");
        }
        if self.turn_timeout.is_none() {
            self.turn_timeout = env_parse("SHOPKEEP_TURN_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.search_top_k.is_none() {
            self.search_top_k = env_parse("SHOPKEEP_SEARCH_TOP_K");
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the chat model.
    #[must_use]
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    /// Sets the decomposer model.
    #[must_use]
    pub fn decomposer_model(mut self, model: impl Into<String>) -> Self {
        self.decomposer_model = Some(model.into());
        self
    }

    /// Sets the chat temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the chat max tokens.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the decomposer max tokens.
    #[must_use]
    pub const fn decomposer_max_tokens(mut self, n: u32) -> Self {
        self.decomposer_max_tokens = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the maximum model calls per turn.
    #[must_use]
    pub const fn max_tool_iterations(mut self, n: usize) -> Self {
        self.max_tool_iterations = Some(n);
        self
    }

    /// Sets the per-turn budget.
    #[must_use]
    pub const fn turn_timeout(mut self, duration: Duration) -> Self {
        self.turn_timeout = Some(duration);
        self
    }

    /// Sets the email send budget.
    #[must_use]
    pub const fn tool_timeout(mut self, duration: Duration) -> Self {
        self.tool_timeout = Some(duration);
        self
    }

    /// Sets the search top-k.
    #[must_use]
    pub const fn search_top_k(mut self, n: usize) -> Self {
        self.search_top_k = Some(n);
        self
    }

    /// Sets the default order preview length.
    #[must_use]
    pub const fn history_preview_limit(mut self, n: usize) -> Self {
        self.history_preview_limit = Some(n);
        self
    }

    /// Enables or disables concurrent tool execution.
    #[must_use]
    pub const fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = Some(enabled);
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgentError::ApiKeyMissing)?;

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            chat_model: self
                .chat_model
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            decomposer_model: self
                .decomposer_model
                .unwrap_or_else(|| DEFAULT_DECOMPOSER_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            decomposer_max_tokens: self
                .decomposer_max_tokens
                .unwrap_or(DEFAULT_DECOMPOSER_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_tool_iterations: self
                .max_tool_iterations
                .unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS)
                .max(1),
            turn_timeout: self
                .turn_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS)),
            tool_timeout: self
                .tool_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS)),
            search_top_k: self.search_top_k.unwrap_or(DEFAULT_SEARCH_TOP_K).max(1),
            history_preview_limit: self
                .history_preview_limit
                .unwrap_or(DEFAULT_HISTORY_PREVIEW_LIMIT)
                .max(1),
            parallel_tool_calls: self.parallel_tool_calls.unwrap_or(true),
        })
    }
}
