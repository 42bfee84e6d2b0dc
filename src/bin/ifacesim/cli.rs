//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// ifacesim - simulate which interfaces a snap would auto-connect
#[derive(Parser)]
#[command(name = "ifacesim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalOptions {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Directory holding one sub-directory per component
    #[arg(long, global = true, env = "IFACESIM_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Base declaration file to use instead of the built-in one
    #[arg(long, global = true, env = "IFACESIM_BASE_DECLARATION")]
    pub base_declaration: Option<PathBuf>,

    /// Output format (defaults to the configured one, else json)
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Human,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate installing a target snap and report its auto-connections
    AutoConnections(OpArgs),

    /// Check that the listed snaps' declarations decode
    CheckDecls(OpArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct OpArgs {
    /// Operation parameters as a JSON object
    pub params: String,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
