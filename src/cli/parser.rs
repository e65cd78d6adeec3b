//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shopkeep: conversational shopping assistant backend.
///
/// Runs assistant turns, reconciles saved turn histories, and searches
/// the catalog, all against an in-memory store loaded from a JSON fixture.
#[derive(Parser, Debug)]
#[command(name = "shopkeep")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose (debug) logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one assistant turn.
    ///
    /// Requires an API key (`OPENAI_API_KEY` or `SHOPKEEP_API_KEY`).
    #[command(after_help = r#"Examples:
  shopkeep chat "gaming monitor under $300" --user user_0042 --store store.json
  shopkeep chat "email me that" --user user_0042 --store store.json --last-item P1
  shopkeep --format json chat "my orders" -u user_0042 -s store.json | jq .source
"#)]
    Chat {
        /// What the user typed.
        query: String,

        /// User id.
        #[arg(short, long, env = "SHOPKEEP_USER")]
        user: String,

        /// Store fixture (JSON).
        #[arg(short, long, env = "SHOPKEEP_STORE")]
        store: PathBuf,

        /// Id of a product shown in the previous turn (repeatable).
        #[arg(long = "last-item")]
        last_items: Vec<String>,

        /// Earlier messages of the conversation (JSON array).
        #[arg(long)]
        history: Option<PathBuf>,

        /// Chat model override.
        #[arg(long)]
        model: Option<String>,

        /// Search without LLM query decomposition.
        #[arg(long)]
        no_decompose: bool,
    },

    /// Email or purchase a product directly, without a model turn.
    ///
    /// Requires an API key like `chat`; the model itself is not called.
    #[command(after_help = r#"Examples:
  shopkeep action purchase M100 --user user_0042 --store store.json
  shopkeep --format json action email M100 -u user_0042 -s store.json
"#)]
    Action {
        /// Action to run.
        #[arg(value_parser = ["email", "purchase"])]
        action: String,

        /// Product id (SKU).
        item_id: String,

        /// User id.
        #[arg(short, long, env = "SHOPKEEP_USER")]
        user: String,

        /// Store fixture (JSON).
        #[arg(short, long, env = "SHOPKEEP_STORE")]
        store: PathBuf,
    },

    /// Reconcile a saved turn history into a turn result.
    ///
    /// Unresolved searches are re-run against the store's catalog.
    #[command(after_help = r#"Examples:
  shopkeep reconcile turn.json --store store.json
  cat turn.json | shopkeep --format json reconcile - --store store.json
"#)]
    Reconcile {
        /// History file (JSON array of messages), or `-` for stdin.
        history: PathBuf,

        /// Store fixture (JSON).
        #[arg(short, long, env = "SHOPKEEP_STORE")]
        store: PathBuf,

        /// Items per compensating search.
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// Search the store's catalog.
    #[command(after_help = r#"Examples:
  shopkeep search "gaming monitor" --store store.json
  shopkeep search "keyboard" -s store.json -k 3
"#)]
    Search {
        /// Search query text.
        query: String,

        /// Store fixture (JSON).
        #[arg(short, long, env = "SHOPKEEP_STORE")]
        store: PathBuf,

        /// Maximum number of results.
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// List the tool definitions offered to the model.
    Tools {
        /// Include the web search tool.
        #[arg(long)]
        web: bool,
    },
}
