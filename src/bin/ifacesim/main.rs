//! ifacesim CLI - simulate interface auto-connections offline

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use ifacesim::GlobalContext;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the report; logs go to stderr
    let filter = if cli.options.verbose {
        EnvFilter::new("ifacesim=debug")
    } else {
        EnvFilter::new("ifacesim=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let mut gctx = GlobalContext::new()?;
    gctx.set_verbose(cli.options.verbose);
    gctx.set_color(!cli.options.no_color);

    match cli.command {
        Commands::AutoConnections(args) => {
            commands::auto_connections::execute(&gctx, &cli.options, args)
        }
        Commands::CheckDecls(args) => commands::check_decls::execute(&gctx, &cli.options, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
