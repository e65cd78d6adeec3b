//! CLI command implementations.
//!
//! Each command loads the store fixture into in-memory backends, runs on a
//! short-lived tokio runtime, and returns its rendered output.

use std::fmt::Write as FmtWrite;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::agent::{
    ActionKind, AgentConfig, ChatMessage, LlmDecomposer, Orchestrator, PriorContext, ResultReconciler,
    RetrievalAdapter, ToolSet, create_provider,
};
use crate::catalog::{PassthroughDecomposer, QueryDecomposer};
use crate::cli::output::{
    OutputFormat, format_action, format_items, format_tools, format_turn,
};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};
use crate::memory::{Backends, Fixture};

/// Parameters for the chat command.
#[derive(Debug, Clone)]
pub struct ChatParams<'a> {
    /// What the user typed.
    pub query: &'a str,
    /// User id.
    pub user: &'a str,
    /// Store fixture.
    pub store: &'a Path,
    /// Products shown in the previous turn.
    pub last_items: &'a [String],
    /// Earlier conversation messages.
    pub history: Option<&'a Path>,
    /// Chat model override.
    pub model: Option<&'a str>,
    /// Skip LLM query decomposition.
    pub no_decompose: bool,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format)?;

    match &cli.command {
        Commands::Chat {
            query,
            user,
            store,
            last_items,
            history,
            model,
            no_decompose,
        } => cmd_chat(
            &ChatParams {
                query,
                user,
                store,
                last_items,
                history: history.as_deref(),
                model: model.as_deref(),
                no_decompose: *no_decompose,
            },
            format,
        ),
        Commands::Action {
            action,
            item_id,
            user,
            store,
        } => cmd_action(action, item_id, user, store, format),
        Commands::Reconcile {
            history,
            store,
            top_k,
        } => cmd_reconcile(history, store, *top_k, format),
        Commands::Search {
            query,
            store,
            top_k,
        } => cmd_search(query, store, *top_k, format),
        Commands::Tools { web } => Ok(cmd_tools(*web, format)),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|source| CommandError::Io {
        path: "async runtime".to_string(),
        source,
    })
}

fn load_backends(store: &Path) -> Result<Backends> {
    let fixture = Fixture::load(store)?;
    debug!(
        store = %store.display(),
        products = fixture.products.len(),
        users = fixture.users.len(),
        "store loaded"
    );
    Ok(Backends::from_fixture(fixture))
}

/// Reads a JSON message list from `path`, or stdin for `-`.
fn read_messages(path: &Path) -> Result<Vec<ChatMessage>> {
    let label = path.display().to_string();
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|source| CommandError::Io {
                path: "stdin".to_string(),
                source,
            })?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|source| CommandError::Io {
            path: label.clone(),
            source,
        })?
    };
    serde_json::from_str(&text).map_err(|source| CommandError::Json {
        path: label,
        source,
    })
}

fn passthrough_adapter(backends: &Backends, top_k: usize) -> RetrievalAdapter {
    RetrievalAdapter::new(
        backends.retriever(Arc::new(PassthroughDecomposer)),
        backends.vocabulary.clone(),
        top_k,
    )
}

fn cmd_chat(params: &ChatParams<'_>, format: OutputFormat) -> Result<String> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(model) = params.model {
        builder = builder.chat_model(model);
    }
    let config = builder.build()?;
    let provider = create_provider(&config)?;

    let backends = load_backends(params.store)?;
    let prior = PriorContext {
        messages: params.history.map(read_messages).transpose()?.unwrap_or_default(),
        last_item_ids: params.last_items.to_vec(),
    };

    let decomposer: Arc<dyn QueryDecomposer> = if params.no_decompose {
        Arc::new(PassthroughDecomposer)
    } else {
        Arc::new(LlmDecomposer::new(provider.clone(), &config))
    };
    let retrieval = RetrievalAdapter::new(
        backends.retriever(decomposer),
        backends.vocabulary.clone(),
        config.search_top_k,
    );
    let orchestrator = Orchestrator::new(provider, config, backends.services(), retrieval);

    let result = runtime()?.block_on(orchestrator.process_turn(
        params.query,
        params.user,
        Some(prior),
    ));

    let mut out = format_turn(&result, format);
    let sent = backends.mailer.sent();
    if format == OutputFormat::Text && !sent.is_empty() {
        for email in &sent {
            let _ = writeln!(out, "Email recorded: {} ({})", email.to, email.subject);
        }
    }
    Ok(out)
}

fn cmd_action(
    action: &str,
    item_id: &str,
    user: &str,
    store: &Path,
    format: OutputFormat,
) -> Result<String> {
    let action =
        ActionKind::parse(action).ok_or_else(|| CommandError::UnknownAction(action.to_string()))?;
    let config = AgentConfig::builder().from_env().build()?;
    let provider = create_provider(&config)?;
    let backends = load_backends(store)?;

    let retrieval = passthrough_adapter(&backends, config.search_top_k);
    let orchestrator = Orchestrator::new(provider, config, backends.services(), retrieval);
    let outcome = runtime()?.block_on(orchestrator.execute_action(action, item_id, user));

    let mut out = format_action(&outcome, format);
    if format == OutputFormat::Text {
        for email in backends.mailer.sent() {
            let _ = writeln!(out, "Email recorded: {} ({})", email.to, email.subject);
        }
    }
    Ok(out)
}

fn cmd_reconcile(
    history: &Path,
    store: &Path,
    top_k: usize,
    format: OutputFormat,
) -> Result<String> {
    let messages = read_messages(history)?;
    let backends = load_backends(store)?;
    let reconciler = ResultReconciler::new(passthrough_adapter(&backends, top_k));
    let result = runtime()?.block_on(reconciler.reconcile(&messages));
    Ok(format_turn(&result, format))
}

fn cmd_search(query: &str, store: &Path, top_k: usize, format: OutputFormat) -> Result<String> {
    let backends = load_backends(store)?;
    let adapter = passthrough_adapter(&backends, top_k);
    let items = runtime()?.block_on(adapter.try_decompose_and_search(query))?;
    Ok(format_items(&items, format))
}

fn cmd_tools(web: bool, format: OutputFormat) -> String {
    format_tools(ToolSet::for_turn(web).definitions(), format)
}
