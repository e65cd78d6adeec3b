//! In-memory collaborators loaded from a JSON fixture.
//!
//! Used by the command line and the integration tests. A fixture looks like:
//!
//! ```json
//! {
//!   "categories": ["Monitors"],
//!   "products": [{"sku": "P1", "name": "...", ...}],
//!   "users": [{"userId": "u1", "firstName": "Jane", ...}],
//!   "orders": [{"userId": "u1", "orderNumber": "1001", ...}],
//!   "web_results": [{"title": "...", "content": "...", "url": "..."}]
//! }
//! ```
//!
//! Web search is reported unavailable unless `web_results` is present.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{CategoryVocabulary, InMemoryCatalog, QueryDecomposer, SelfQueryRetriever};
use crate::core::{Item, Order, UserProfile};
use crate::error::{AgentError, CommandError, Result};
use crate::services::{
    EmailTransport, IdentityStore, OrderHistory, OutgoingEmail, Services, WebSearch, WebSnippet,
};

/// An order tagged with its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOrder {
    /// Owning user.
    #[serde(alias = "userId")]
    pub user_id: String,
    /// The order itself.
    #[serde(flatten)]
    pub order: Order,
}

/// Fixture document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    /// Category vocabulary. Derived from the products when empty.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Catalog items.
    #[serde(default)]
    pub products: Vec<Item>,
    /// Known users.
    #[serde(default)]
    pub users: Vec<UserProfile>,
    /// Past orders.
    #[serde(default)]
    pub orders: Vec<StoredOrder>,
    /// Canned web results; `None` disables web search.
    #[serde(default)]
    pub web_results: Option<Vec<WebSnippet>>,
}

impl Fixture {
    /// Reads and validates a fixture file.
    pub fn load(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| CommandError::Io {
            path: label.clone(),
            source,
        })?;
        Self::parse(&text, &label)
    }

    /// Parses and validates fixture JSON. `label` names the source in errors.
    pub fn parse(json: &str, label: &str) -> Result<Self> {
        let fixture: Self = serde_json::from_str(json).map_err(|source| CommandError::Json {
            path: label.to_string(),
            source,
        })?;
        fixture.validate()?;
        Ok(fixture)
    }

    fn validate(&self) -> Result<()> {
        if let Some(p) = self.products.iter().find(|p| p.id.trim().is_empty()) {
            return Err(CommandError::Fixture(format!(
                "product '{}' has an empty id",
                p.name
            )));
        }
        if let Some(o) = self
            .orders
            .iter()
            .find(|o| !self.users.iter().any(|u| u.id == o.user_id))
        {
            return Err(CommandError::Fixture(format!(
                "order {} belongs to unknown user '{}'",
                o.order.reference, o.user_id
            )));
        }
        Ok(())
    }
}

/// Identity, order history and web search held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: HashMap<String, UserProfile>,
    orders: HashMap<String, Vec<Order>>,
    web_results: Option<Vec<WebSnippet>>,
}

impl InMemoryStore {
    /// Builds a store. Orders are kept most recent first.
    #[must_use]
    pub fn new(
        users: Vec<UserProfile>,
        orders: Vec<StoredOrder>,
        web_results: Option<Vec<WebSnippet>>,
    ) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        let mut by_user: HashMap<String, Vec<Order>> = HashMap::new();
        for stored in orders {
            by_user.entry(stored.user_id).or_default().push(stored.order);
        }
        for list in by_user.values_mut() {
            list.sort_by(|a, b| b.date.cmp(&a.date));
        }
        Self {
            users,
            orders: by_user,
            web_results,
        }
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<UserProfile, AgentError> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound {
                kind: "user",
                id: user_id.to_string(),
            })
    }
}

#[async_trait]
impl OrderHistory for InMemoryStore {
    async fn get_orders(&self, user_id: &str) -> Result<Vec<Order>, AgentError> {
        Ok(self.orders.get(user_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl WebSearch for InMemoryStore {
    async fn available(&self) -> bool {
        self.web_results.is_some()
    }

    async fn search(&self, query: &str) -> Result<Vec<WebSnippet>, AgentError> {
        let Some(results) = &self.web_results else {
            return Err(AgentError::upstream("web search", "not configured"));
        };
        let terms: Vec<String> = query
            .split_whitespace()
            .filter(|t| t.len() > 2)
            .map(str::to_lowercase)
            .collect();
        Ok(results
            .iter()
            .filter(|r| {
                let haystack = format!("{} {}", r.title, r.content).to_lowercase();
                terms.iter().any(|t| haystack.contains(t.as_str()))
            })
            .cloned()
            .collect())
    }
}

/// Email transport that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    /// Creates an empty mailer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailTransport for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AgentError> {
        info!(to = %email.to, subject = %email.subject, "email recorded");
        self.sent
            .lock()
            .map_err(|e| AgentError::upstream("email", e))?
            .push(email.clone());
        Ok(())
    }
}

/// Every in-memory collaborator built from one fixture.
#[derive(Debug, Clone)]
pub struct Backends {
    /// Catalog lookup and filtered index.
    pub catalog: Arc<InMemoryCatalog>,
    /// Identity, orders, and web search.
    pub store: Arc<InMemoryStore>,
    /// Recording email transport.
    pub mailer: Arc<RecordingMailer>,
    /// Category vocabulary.
    pub vocabulary: Arc<CategoryVocabulary>,
}

impl Backends {
    /// Builds the collaborators from `fixture`.
    #[must_use]
    pub fn from_fixture(fixture: Fixture) -> Self {
        let catalog = InMemoryCatalog::new(fixture.products);
        let categories = if fixture.categories.is_empty() {
            catalog.categories()
        } else {
            fixture.categories
        };
        Self {
            catalog: Arc::new(catalog),
            store: Arc::new(InMemoryStore::new(
                fixture.users,
                fixture.orders,
                fixture.web_results,
            )),
            mailer: Arc::new(RecordingMailer::new()),
            vocabulary: Arc::new(CategoryVocabulary::new(categories)),
        }
    }

    /// Bundles the collaborators for the orchestrator.
    #[must_use]
    pub fn services(&self) -> Services {
        Services {
            products: self.catalog.clone(),
            identity: self.store.clone(),
            orders: self.store.clone(),
            mailer: self.mailer.clone(),
            web: self.store.clone(),
        }
    }

    /// A self-querying retriever over the catalog.
    #[must_use]
    pub fn retriever(&self, decomposer: Arc<dyn QueryDecomposer>) -> Arc<SelfQueryRetriever> {
        Arc::new(SelfQueryRetriever::new(decomposer, self.catalog.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "products": [
            {"sku": "M1", "name": "Gaming Monitor", "shortDescription": "144Hz",
             "productUrl": "https://shop.example/p/M1", "regularPrice": 300.0,
             "salePrice": 250.0, "categoryName": "Monitors", "isOnSale": true}
        ],
        "users": [
            {"userId": "u1", "firstName": "Jane", "lastName": "Doe",
             "email": "jane@example.com", "phone": "555"}
        ],
        "orders": [
            {"userId": "u1", "orderNumber": "1001", "orderDate": "2024-01-02T00:00:00Z",
             "totalPrice": 10.0, "lineItems": []},
            {"userId": "u1", "orderNumber": "1002", "orderDate": "2024-03-02T00:00:00Z",
             "totalPrice": 20.0, "lineItems": []}
        ]
    }"#;

    #[tokio::test]
    async fn test_parse_and_build() {
        let fixture = Fixture::parse(FIXTURE, "inline").unwrap_or_else(|_| unreachable!());
        let backends = Backends::from_fixture(fixture);
        assert_eq!(&*backends.vocabulary.snapshot(), &["Monitors"]);

        let user = backends.store.get_user("u1").await.map(|u| u.first_name);
        assert_eq!(user.ok().as_deref(), Some("Jane"));
        assert!(backends.store.get_user("nobody").await.is_err());

        let orders = backends.store.get_orders("u1").await.unwrap_or_default();
        let refs: Vec<&str> = orders.iter().map(|o| o.reference.as_str()).collect();
        assert_eq!(refs, vec!["1002", "1001"]);
        assert!(!backends.store.available().await);
    }

    #[test]
    fn test_rejects_orphan_orders() {
        let json = r#"{"orders": [{"userId": "ghost", "orderNumber": "1",
            "orderDate": "2024-01-02T00:00:00Z", "totalPrice": 1.0, "lineItems": []}]}"#;
        assert!(matches!(
            Fixture::parse(json, "inline"),
            Err(CommandError::Fixture(_))
        ));
    }

    #[test]
    fn test_reports_json_errors_with_label() {
        let err = Fixture::parse("{", "store.json").map(|_| ());
        assert!(matches!(err, Err(CommandError::Json { ref path, .. }) if path == "store.json"));
    }

    #[tokio::test]
    async fn test_web_search_matches_terms() {
        let store = InMemoryStore::new(
            Vec::new(),
            Vec::new(),
            Some(vec![WebSnippet {
                title: "Toronto weather".to_string(),
                content: "Sunny, 21C".to_string(),
                url: "https://weather.example/toronto".to_string(),
            }]),
        );
        assert!(store.available().await);
        assert_eq!(store.search("weather in Toronto").await.map(|r| r.len()).ok(), Some(1));
        assert_eq!(store.search("stock prices").await.map(|r| r.len()).ok(), Some(0));
    }

    #[tokio::test]
    async fn test_recording_mailer() {
        let mailer = RecordingMailer::new();
        let email = OutgoingEmail {
            to: "a@b.c".to_string(),
            subject: "s".to_string(),
            html_body: String::new(),
            text_body: String::new(),
        };
        assert!(mailer.send(&email).await.is_ok());
        assert_eq!(mailer.sent(), vec![email]);
    }
}
