use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cognition-server", about = "Session and streaming orchestration server")]
pub struct Cli {
    /// Path to a config file layered on top of the discovered defaults.
    #[arg(long, global = true, env = "COGNITION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP/SSE server (default when no subcommand is given).
    Serve {
        /// Override `server.bind` from the loaded config.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the fully merged configuration as YAML and exit.
    ShowConfig,
}
