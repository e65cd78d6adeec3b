//! CLI layer for shopkeep.
//!
//! Provides the command-line interface using clap, with commands for
//! running assistant turns, reconciling saved histories, searching the
//! catalog, and listing tool definitions.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
