//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, config::ConfigCommands, import::ImportArgs, init::InitArgs,
    list::ListArgs, refs::RefCommands,
};

#[derive(Parser)]
#[command(name = "cadastro")]
#[command(author, version, about = "Spreadsheet import for engineering cadastres")]
#[command(long_about = "Validate, preview and commit spreadsheet imports of welds, valves, cables, drawings, equipment and luminaires against the project's reference tables.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct GlobalOpts {
    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging, full preview)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .cadastro/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new cadastro project
    Init(InitArgs),

    /// Import a spreadsheet into a cadastre (or export its template)
    Import(ImportArgs),

    /// Maintain reference tables (linhas, fluidos, disciplinas, areas)
    #[command(subcommand)]
    Ref(RefCommands),

    /// List records stored in a cadastre
    List(ListArgs),

    /// View and modify configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
