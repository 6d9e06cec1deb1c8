//! Top-level CLI parser with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Voice-driven conversational agent.
#[derive(Parser)]
#[command(name = "quip")]
#[command(about = "Talk to a local language model, out loud")]
#[command(version)]
pub struct Cli {
    /// Path to the settings file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the Ollama model name for this invocation
    #[arg(long, global = true, env = "QUIP_MODEL")]
    pub model: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_args_parse() {
        let cli = Cli::parse_from(["quip", "--verbose", "--model", "llama3.1:8b", "repl"]);
        assert!(cli.verbose);
        assert_eq!(cli.model.as_deref(), Some("llama3.1:8b"));
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::parse_from(["quip"]);
        assert!(cli.command.is_none());
    }
}
