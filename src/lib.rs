//! # shopkeep
//!
//! Conversational shopping assistant backend.
//!
//! Each user message runs as one turn: a language model directs tool calls
//! (catalog search, email, purchase, account, order history, web search),
//! and the tool outputs are reconciled into a [`TurnResult`](agent::TurnResult)
//! carrying the reply, the matched products, and a provenance tag.
//!
//! # Modules
//!
//! - [`agent`]: turn orchestration, the tool-calling loop, and reconciliation
//! - [`catalog`]: self-querying product retrieval
//! - [`core`]: shared domain types
//! - [`services`]: contracts for external collaborators
//! - [`memory`]: in-memory collaborators loaded from a JSON fixture
//! - [`cli`]: command-line interface

pub mod agent;
pub mod catalog;
pub mod cli;
pub mod core;
pub mod email;
pub mod error;
pub mod memory;
pub mod services;

pub use error::{AgentError, CommandError, Result};
