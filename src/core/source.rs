//! Provenance tag for a turn result.
//!
//! Lives in `core` so the reconciler, the CLI renderer, and the serialized
//! response share one definition of the tag vocabulary.

use serde::{Deserialize, Serialize};

/// Which mechanism produced a turn's result.
///
/// Every variant except [`Source::None`] is a success tag. Once a success tag
/// has been recorded for a turn it is never replaced by `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Items came from catalog search.
    Search,
    /// An email or purchase side effect was performed.
    Action,
    /// Account details were shown.
    Account,
    /// Order history was shown.
    History,
    /// Pure conversation, no tools called.
    Chat,
    /// Conversation backed by a web search.
    ChatWithSearch,
    /// Nothing useful was produced.
    None,
}

impl Source {
    /// Parses a tag (case-insensitive). Accepts the legacy names
    /// (`vector_db`, `general_chat`, ...) found in older stored responses.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "search" | "vector_db" => Some(Self::Search),
            "action" => Some(Self::Action),
            "account" | "user_info" => Some(Self::Account),
            "history" | "purchase_history" => Some(Self::History),
            "chat" | "general_chat" => Some(Self::Chat),
            "chat_with_search" | "general_chat_with_search" => Some(Self::ChatWithSearch),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Returns `true` for every tag except [`Source::None`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Action => "action",
            Self::Account => "account",
            Self::History => "history",
            Self::Chat => "chat",
            Self::ChatWithSearch => "chat_with_search",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
