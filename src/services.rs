//! External collaborator contracts.
//!
//! The agent core never talks to a database, index, mail server, or search
//! API directly. Everything outside the turn pipeline sits behind one of
//! these traits and is bundled into [`Services`] at startup.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Item, Order, UserProfile};
use crate::error::AgentError;

/// Resolves catalog items by id.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Returns the item with `id`.
    ///
    /// # Errors
    ///
    /// [`AgentError::NotFound`] if no such item exists, or
    /// [`AgentError::UpstreamUnavailable`] if the catalog is unreachable.
    async fn get_item(&self, id: &str) -> Result<Item, AgentError>;
}

/// Filtered similarity search with query decomposition.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Splits `query` into a semantic string plus a metadata filter
    /// (category values restricted to `vocabulary`) and returns up to `k`
    /// items by descending relevance.
    async fn decompose_and_search(
        &self,
        query: &str,
        k: usize,
        vocabulary: &[String],
    ) -> Result<Vec<Item>, AgentError>;
}

/// User identity lookup.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns the profile for `user_id`.
    ///
    /// # Errors
    ///
    /// [`AgentError::NotFound`] if the user does not exist.
    async fn get_user(&self, user_id: &str) -> Result<UserProfile, AgentError>;
}

/// Past order lookup.
#[async_trait]
pub trait OrderHistory: Send + Sync {
    /// Returns the user's orders, most recent first.
    async fn get_orders(&self, user_id: &str) -> Result<Vec<Order>, AgentError>;
}

/// A rendered email ready for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
    /// Plain-text body.
    pub text_body: String,
}

/// Email delivery.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Sends `email` once. Implementations must not retry internally.
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AgentError>;
}

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSnippet {
    /// Page title.
    pub title: String,
    /// Extracted text.
    pub content: String,
    /// Page URL.
    pub url: String,
}

/// Web search provider.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Whether the provider is configured and reachable. When `false`
    /// the model is never offered the `web_search` tool.
    async fn available(&self) -> bool;

    /// Runs a web search.
    async fn search(&self, query: &str) -> Result<Vec<WebSnippet>, AgentError>;
}

/// All collaborators a turn may touch.
#[derive(Clone)]
pub struct Services {
    /// Catalog item lookup.
    pub products: Arc<dyn ProductLookup>,
    /// User identity.
    pub identity: Arc<dyn IdentityStore>,
    /// Order history.
    pub orders: Arc<dyn OrderHistory>,
    /// Email delivery.
    pub mailer: Arc<dyn EmailTransport>,
    /// Web search.
    pub web: Arc<dyn WebSearch>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
