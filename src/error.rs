//! Error types for shopkeep.
//!
//! [`AgentError`] covers the turn pipeline (provider, tools, retrieval,
//! reconciliation). [`CommandError`] wraps it for the command-line layer,
//! adding I/O and fixture failures.

use std::time::Duration;

use thiserror::Error;

/// Errors raised inside the agent pipeline.
///
/// Only the provider and configuration variants ever escape a turn; tool
/// handlers convert everything else into text for the model, and the
/// orchestrator converts whatever remains into the fallback reply.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured for the provider.
    #[error("API key missing: set OPENAI_API_KEY or SHOPKEEP_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name has no implementation.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name from configuration.
        name: String,
    },

    /// The provider API call failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error detail from the SDK.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// A model response could not be parsed into the expected shape.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// The raw content that failed to parse.
        content: String,
    },

    /// A tool rejected its arguments or failed internally.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure detail.
        message: String,
    },

    /// A referenced item or user does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Entity kind (`"item"`, `"user"`).
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A collaborator (retrieval, email, web search, history) is unreachable.
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        /// Collaborator name.
        service: &'static str,
        /// Failure detail.
        message: String,
    },

    /// A tool's embedded payload could not be decoded.
    #[error("malformed output from '{tool}': {message}")]
    MalformedToolOutput {
        /// Tool name.
        tool: String,
        /// Decode error.
        message: String,
    },

    /// The turn exceeded its time budget.
    #[error("turn exceeded {timeout:?}")]
    TurnTimeout {
        /// The configured budget.
        timeout: Duration,
    },

    /// The user query was rejected before the turn started.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Why the query was rejected.
        message: String,
    },
}

impl AgentError {
    /// Convenience constructor for [`AgentError::ToolExecution`].
    pub fn tool(name: &str, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`AgentError::UpstreamUnavailable`].
    pub fn upstream(service: &'static str, message: impl std::fmt::Display) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.to_string(),
        }
    }
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Reading or writing a file or stream failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path or stream name.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// Path of the document.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The fixture parsed but is inconsistent.
    #[error("invalid fixture: {0}")]
    Fixture(String),

    /// An output format name was not recognised.
    #[error("unknown output format: {0}")]
    UnknownFormat(String),

    /// An action name was not recognised.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The agent pipeline failed outside a turn (config, provider setup).
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Result alias for CLI commands.
pub type Result<T, E = CommandError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = AgentError::NotFound {
            kind: "item",
            id: "P1".to_string(),
        };
        assert_eq!(err.to_string(), "item 'P1' not found");
    }

    #[test]
    fn test_upstream_display() {
        let err = AgentError::upstream("retrieval", "connection refused");
        assert_eq!(err.to_string(), "retrieval unavailable: connection refused");
    }

    #[test]
    fn test_command_error_wraps_agent_error() {
        let err: CommandError = AgentError::ApiKeyMissing.into();
        assert!(err.to_string().contains("API key missing"));
    }
}
