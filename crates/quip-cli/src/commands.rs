//! Subcommand definitions.

use std::path::PathBuf;

use clap::Subcommand;

/// All quip subcommands. With no subcommand, `converse` runs.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the full voice conversation loop (microphone in, speaker out)
    Converse {
        /// Number of response workers
        #[arg(long)]
        workers: Option<usize>,

        /// Utterance that ends the conversation
        #[arg(long)]
        exit_phrase: Option<String>,
    },

    /// Chat over stdin/stdout, with replies spoken aloud
    Repl,

    /// Synthesize text and play it (reads stdin lines when no text given)
    Say {
        /// Text to speak
        text: Option<String>,
    },

    /// Synthesize text to a WAV file and print its base64 encoding
    Export {
        /// Text to synthesize
        text: String,

        /// Output directory for the WAV file
        #[arg(long, default_value = "audio")]
        out: PathBuf,
    },
}
