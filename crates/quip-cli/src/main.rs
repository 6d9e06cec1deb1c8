//! CLI entry point - the composition root.
//!
//! Command dispatch routes to handlers; all infrastructure is wired in
//! `bootstrap`. With no subcommand, the full voice loop runs.

mod bootstrap;
mod commands;
mod handlers;
mod parser;

use clap::Parser;

use commands::Commands;
use parser::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let settings = bootstrap::load_settings(&cli)?;

    let command = cli.command.unwrap_or(Commands::Converse {
        workers: None,
        exit_phrase: None,
    });

    match command {
        Commands::Converse {
            workers,
            exit_phrase,
        } => {
            handlers::converse::execute(&settings, workers, exit_phrase).await?;
        }
        Commands::Repl => {
            handlers::repl::execute(&settings).await?;
        }
        Commands::Say { text } => {
            handlers::say::execute(&settings, text).await?;
        }
        Commands::Export { text, out } => {
            handlers::export::execute(&settings, &text, &out).await?;
        }
    }

    Ok(())
}

/// Initialize logging: `RUST_LOG` wins, otherwise the verbosity flag.
fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
