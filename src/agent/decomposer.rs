//! LLM-backed query decomposition.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::message::{ChatRequest, system_message, user_message};
use super::prompt::{DECOMPOSER_SYSTEM_PROMPT, build_decomposer_prompt};
use super::provider::LlmProvider;
use crate::catalog::{DecomposedQuery, MetadataFilter, QueryDecomposer, RawCondition};
use crate::error::AgentError;

/// The model's JSON answer before validation.
#[derive(Debug, Default, Deserialize)]
struct RawDecomposition {
    #[serde(default)]
    query: String,
    #[serde(default)]
    filter: Vec<RawCondition>,
}

/// Asks the model to split a request into a semantic query and a filter.
///
/// Unparseable model output falls back to an unfiltered search on the raw
/// text; only provider failures are reported.
pub struct LlmDecomposer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl LlmDecomposer {
    /// Creates a decomposer using `config.decomposer_model`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: &AgentConfig) -> Self {
        Self {
            provider,
            model: config.decomposer_model.clone(),
            max_tokens: config.decomposer_max_tokens,
        }
    }

    /// Parses the model's answer, tolerating markdown fences.
    ///
    /// When `lenient` is set, unparseable content yields an unfiltered query
    /// over `text` instead of an error.
    fn parse(
        content: &str,
        text: &str,
        vocabulary: &[String],
        lenient: bool,
    ) -> Result<DecomposedQuery, AgentError> {
        let trimmed = content.trim();
        let json_str = if trimmed.starts_with("```") {
            trimmed
                .trim_start_matches("```json")
                .trim_start_matches("```")
                .trim_end_matches("```")
                .trim()
        } else {
            trimmed
        };

        match serde_json::from_str::<RawDecomposition>(json_str) {
            Ok(raw) => {
                let query = if raw.query.trim().is_empty() {
                    text.trim().to_string()
                } else {
                    raw.query.trim().to_string()
                };
                Ok(DecomposedQuery {
                    query,
                    filter: MetadataFilter::from_raw(&raw.filter, vocabulary),
                })
            }
            Err(e) if lenient => {
                warn!(error = %e, "decomposition output unparseable, searching unfiltered");
                Ok(DecomposedQuery::unfiltered(text))
            }
            Err(e) => Err(AgentError::ResponseParse {
                message: format!("failed to parse decomposition: {e}"),
                content: content.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for LlmDecomposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmDecomposer")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl QueryDecomposer for LlmDecomposer {
    async fn decompose(
        &self,
        text: &str,
        vocabulary: &[String],
    ) -> Result<DecomposedQuery, AgentError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                system_message(DECOMPOSER_SYSTEM_PROMPT),
                user_message(&build_decomposer_prompt(text, vocabulary)),
            ],
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            json_mode: true,
            tools: Vec::new(),
        };
        let response = self.provider.chat(&request).await?;
        let decomposed = Self::parse(&response.content, text, vocabulary, true)?;
        debug!(
            semantic = %decomposed.query,
            conditions = decomposed.filter.conditions.len(),
            "query decomposed"
        );
        Ok(decomposed)
    }
}
