//! Per-turn tool binding.

use std::time::Duration;

use tracing::debug;

use super::config::AgentConfig;
use super::executor::ToolExecutor;
use super::retrieval::RetrievalAdapter;
use super::tool::ToolSet;
use crate::core::UserProfile;
use crate::services::Services;

/// Builds a [`ToolExecutor`] bound to one user for one turn.
///
/// The web search tool is only offered when the collaborator reports itself
/// available at bind time.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    services: Services,
    retrieval: RetrievalAdapter,
    tool_timeout: Duration,
    history_limit: usize,
}

impl ToolRegistry {
    /// Creates a registry over `services`.
    #[must_use]
    pub fn new(services: Services, retrieval: RetrievalAdapter, config: &AgentConfig) -> Self {
        Self {
            services,
            retrieval,
            tool_timeout: config.tool_timeout,
            history_limit: config.history_preview_limit,
        }
    }

    /// Binds the tool set to `user`.
    pub async fn bind(&self, user: UserProfile) -> ToolExecutor {
        let web = self.services.web.available().await;
        let tools = ToolSet::for_turn(web);
        debug!(user_id = %user.id, web_search = web, tools = tools.len(), "tools bound");
        ToolExecutor::new(
            user,
            self.services.clone(),
            self.retrieval.clone(),
            tools,
            self.tool_timeout,
            self.history_limit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{CountingBackend, jane};
    use crate::agent::tool::ToolKind;
    use crate::memory::{Backends, Fixture};
    use crate::services::WebSnippet;
    use std::sync::Arc;

    fn registry(web: bool) -> ToolRegistry {
        let fixture = Fixture {
            users: vec![jane()],
            web_results: web.then(Vec::<WebSnippet>::new),
            ..Fixture::default()
        };
        let backends = Backends::from_fixture(fixture);
        let retrieval =
            RetrievalAdapter::new(Arc::new(CountingBackend::default()), backends.vocabulary.clone(), 5);
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        ToolRegistry::new(backends.services(), retrieval, &config)
    }

    #[tokio::test]
    async fn test_web_search_follows_availability() {
        let without = registry(false).bind(jane()).await;
        assert!(!without.tools().contains(ToolKind::WebSearch));
        assert!(without.tools().contains(ToolKind::Search));

        let with = registry(true).bind(jane()).await;
        assert!(with.tools().contains(ToolKind::WebSearch));
        assert_eq!(with.user().id, "user_0042");
    }
}
