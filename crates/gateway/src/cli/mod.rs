pub mod repl;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wayfarer", about = "Conversational travel-assistant gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Interactive chat REPL.
    Chat {
        /// Reuse a specific thread ID instead of minting one.
        #[arg(long)]
        thread: Option<String>,
    },
    /// Print the version and exit.
    Version,
}
